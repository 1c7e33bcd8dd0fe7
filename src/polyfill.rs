//! Preload polyfill for engines without `<link rel="preload">`.
//!
//! When the probe says preload is unsupported, pending style preloads are
//! fetched by hand: once immediately, then on every poll tick to pick up
//! links inserted later. Each embed runs its own polyfill, which only takes
//! the links carrying its binding name, so several embeds on one page never
//! steal each other's stylesheets. The first page-lifecycle event (`DOMContentLoaded`
//! or `load`) runs one last poll and cancels the task. With native support
//! the polyfill is inert and the links' own `onload` attributes report to
//! the tracker.

use crate::dom::{Document, PreloadProbe};
use chrono::{DateTime, TimeDelta, Utc};
use std::cell::Cell;
use std::rc::Rc;
use tracing::{debug, trace};

/// Interval between polls.
pub const POLL_INTERVAL_MS: i64 = 100;

/// Shared stop flag, checked on every tick.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Rc<Cell<bool>>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

/// A manual stylesheet fetch started for one preload link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingFetch {
    /// Tracker binding the completed fetch reports to.
    pub binding: String,
    pub link_id: String,
    pub href: String,
    pub media: Option<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    DomContentLoaded,
    Load,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PolyfillState {
    /// Native preload works; nothing to do.
    Inert,
    Polling,
    Stopped,
}

/// Never fails: a probe error counts as "unsupported".
pub fn supports_native_preload<P>(probe: &P) -> bool
where
    P: PreloadProbe + ?Sized,
{
    match probe.rel_list_supports("preload") {
        Ok(supported) => supported,
        Err(err) => {
            trace!(%err, "preload probe failed; assuming unsupported");
            false
        }
    }
}

/// Start a fetch for every pending style preload owned by `binding` and
/// take the link out of the preload relation so later polls skip it.
pub fn poll_pending_preloads(doc: &mut Document, binding: &str) -> Vec<PendingFetch> {
    let mut fetches = Vec::new();
    for link in doc.links_mut() {
        if !link.is_pending_style_preload() || !link.belongs_to(binding) {
            continue;
        }
        link.rel = None;
        fetches.push(PendingFetch {
            binding: binding.to_owned(),
            link_id: link.id.clone(),
            href: link.href.clone(),
            media: link.media.clone(),
        });
    }
    if !fetches.is_empty() {
        debug!(binding, count = fetches.len(), "polyfill started stylesheet fetches");
    }
    fetches
}

#[derive(Debug)]
pub struct PreloadPolyfill {
    binding: String,
    state: PolyfillState,
    cancel: CancellationToken,
    interval: TimeDelta,
    next_tick: Option<DateTime<Utc>>,
}

impl PreloadPolyfill {
    /// Probe the document and, if needed, run the first poll right away
    /// over the links owned by `binding`.
    pub fn activate(
        binding: impl Into<String>,
        doc: &mut Document,
        now: DateTime<Utc>,
    ) -> (Self, Vec<PendingFetch>) {
        let mut poly = Self {
            binding: binding.into(),
            state: PolyfillState::Inert,
            cancel: CancellationToken::new(),
            interval: TimeDelta::milliseconds(POLL_INTERVAL_MS),
            next_tick: None,
        };
        if supports_native_preload(&*doc) {
            debug!(binding = %poly.binding, "native preload supported; polyfill inert");
            return (poly, Vec::new());
        }
        debug!(
            binding = %poly.binding,
            interval_ms = POLL_INTERVAL_MS,
            "activating preload polyfill"
        );
        poly.state = PolyfillState::Polling;
        poly.next_tick = Some(now + poly.interval);
        let fetches = poll_pending_preloads(doc, &poly.binding);
        (poly, fetches)
    }

    pub fn binding(&self) -> &str {
        &self.binding
    }

    pub fn state(&self) -> PolyfillState {
        self.state
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// When the next tick is due, while polling.
    pub fn next_tick(&self) -> Option<DateTime<Utc>> {
        match self.state {
            PolyfillState::Polling => self.next_tick,
            _ => None,
        }
    }

    /// Timer tick at `now`. A cancelled task stops instead of polling.
    pub fn tick(&mut self, doc: &mut Document, now: DateTime<Utc>) -> Vec<PendingFetch> {
        if self.state != PolyfillState::Polling {
            return Vec::new();
        }
        if self.cancel.is_cancelled() {
            self.stop();
            return Vec::new();
        }
        trace!(binding = %self.binding, "polyfill tick");
        self.next_tick = Some(now + self.interval);
        poll_pending_preloads(doc, &self.binding)
    }

    /// Page lifecycle signal: final poll, then cancel.
    pub fn on_lifecycle(&mut self, doc: &mut Document, event: Lifecycle) -> Vec<PendingFetch> {
        if self.state != PolyfillState::Polling {
            return Vec::new();
        }
        let fetches = poll_pending_preloads(doc, &self.binding);
        self.cancel.cancel();
        self.stop();
        debug!(binding = %self.binding, ?event, "preload polyfill stopped");
        fetches
    }

    fn stop(&mut self) {
        self.state = PolyfillState::Stopped;
        self.next_tick = None;
    }
}
