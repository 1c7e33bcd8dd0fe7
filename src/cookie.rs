//! Completion cookie and the page's cookie jar.
//!
//! Wire contract with the server: name `sb` (or `sb_<slot>`), value = the
//! master hash, `path=/`, expiring seven days after it was set.

use chrono::{DateTime, TimeDelta, Utc};
use core::fmt;
use serde::Serialize;
use std::collections::BTreeMap;

pub const COOKIE_PREFIX: &str = "sb";

/// Cookie lifetime in milliseconds (7 days).
pub const COOKIE_LIFETIME_MS: i64 = 604_800_000;

pub const COOKIE_PATH: &str = "/";

/// Cookie name for an optional slot: `sb` or `sb_<slot>`.
pub fn cookie_name(slot: Option<&str>) -> String {
    match slot {
        Some(slot) if !slot.is_empty() => format!("{COOKIE_PREFIX}_{slot}"),
        _ => COOKIE_PREFIX.to_owned(),
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CompletionCookie {
    pub name: String,
    pub value: String,
    pub path: String,
    pub expires: DateTime<Utc>,
}

impl CompletionCookie {
    pub fn new(slot: Option<&str>, master_hash: &str, now: DateTime<Utc>) -> Self {
        Self {
            name: cookie_name(slot),
            value: master_hash.to_owned(),
            path: COOKIE_PATH.to_owned(),
            expires: now + TimeDelta::milliseconds(COOKIE_LIFETIME_MS),
        }
    }

    /// `expires` attribute in `Date.prototype.toUTCString` form.
    pub fn expires_attr(&self) -> String {
        self.expires.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
    }

    pub fn is_expired(&self, at: DateTime<Utc>) -> bool {
        at >= self.expires
    }
}

impl fmt::Display for CompletionCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={};path={};expires={}",
            self.name,
            self.value,
            self.path,
            self.expires_attr()
        )
    }
}

/// Cookies written during a page's lifetime; the last write per name wins.
#[derive(Clone, Debug, Default)]
pub struct CookieJar {
    cookies: BTreeMap<String, CompletionCookie>,
    writes: usize,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, cookie: CompletionCookie) {
        self.writes += 1;
        self.cookies.insert(cookie.name.clone(), cookie);
    }

    pub fn get(&self, name: &str) -> Option<&CompletionCookie> {
        self.cookies.get(name)
    }

    /// Like `get`, but hides cookies that have expired by `at`.
    pub fn get_live(&self, name: &str, at: DateTime<Utc>) -> Option<&CompletionCookie> {
        self.get(name).filter(|c| !c.is_expired(at))
    }

    /// Total number of cookie writes, including overwrites.
    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompletionCookie> {
        self.cookies.values()
    }
}
