//! Page: one page-load context hosting trackers and the preload polyfill.
//!
//! The page owns a virtual clock, the cookie jar, the global scope
//! (functions and tracker instances, both reached by name), the document
//! and any in-flight polyfill fetches. All mutation happens synchronously
//! inside one of the dispatch methods below, mirroring a browser's single
//! event loop: there is no concurrency, only arbitrary orderings of events.
//!
//! Trackers are bound under the name the generated markup uses
//! (`sb<master hash>`), so several independent embeds coexist on one page.
//! Each embed runs its own preload polyfill, and a finished fetch reports
//! to the binding that started it. Unloading drops everything except the
//! cookies.

use crate::bindings::{Binding, Bindings};
use crate::callback::GlobalFn;
use crate::cookie::{CompletionCookie, CookieJar};
use crate::dom::{Document, LinkElement, PreloadSupport};
use crate::polyfill::{Lifecycle, PendingFetch, PolyfillState, PreloadPolyfill};
use crate::tracker::{Environment, LoadOutcome, Tracker};
use chrono::{DateTime, TimeDelta, Utc};
use std::rc::Rc;
use tracing::{debug, warn};

/// Host services lent to a tracker during one dispatch.
struct PageEnv<'a> {
    now: DateTime<Utc>,
    cookies: &'a mut CookieJar,
    globals: &'a Bindings<GlobalFn>,
}

impl Environment for PageEnv<'_> {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn set_cookie(&mut self, cookie: CompletionCookie) {
        self.cookies.set(cookie);
    }

    fn resolve_global(&self, name: &str) -> Option<GlobalFn> {
        self.globals.lookup(name).cloned()
    }
}

pub struct Page {
    clock: DateTime<Utc>,
    cookies: CookieJar,
    globals: Bindings<GlobalFn>,
    trackers: Bindings<Tracker>,
    document: Document,
    polyfills: Vec<PreloadPolyfill>,
    in_flight: Vec<PendingFetch>,
}

impl Page {
    pub fn new(preload_support: PreloadSupport) -> Self {
        Self::with_clock(preload_support, Utc::now())
    }

    pub fn with_clock(preload_support: PreloadSupport, start: DateTime<Utc>) -> Self {
        Self {
            clock: start,
            cookies: CookieJar::new(),
            globals: Bindings::new(),
            trackers: Bindings::new(),
            document: Document::new(preload_support),
            polyfills: Vec::new(),
            in_flight: Vec::new(),
        }
    }

    /// Carry cookies over from a previous page load.
    pub fn with_cookies(mut self, cookies: CookieJar) -> Self {
        self.cookies = cookies;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock
    }

    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    /// Define (or redefine) a global function.
    pub fn define_global<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn() + 'static,
    {
        let f: GlobalFn = Rc::new(f);
        self.globals.bind(name, f);
    }

    /// Bind `tracker` under `name`, replacing any previous instance.
    pub fn install_tracker(&mut self, name: impl Into<String>, tracker: Tracker) -> Binding {
        let name = name.into();
        let (binding, prev) = self.trackers.bind(name.clone(), tracker);
        if prev.is_some() {
            warn!(binding = %name, "tracker binding redeclared");
        }
        binding
    }

    pub fn tracker(&self, name: &str) -> Option<&Tracker> {
        self.trackers.lookup(name)
    }

    /// `<name>.loaded(id)` from inline markup. `None` when nothing is
    /// bound under `name`.
    pub fn signal_loaded(&mut self, name: &str, id: &str) -> Option<LoadOutcome> {
        let Some(tracker) = self.trackers.lookup_mut(name) else {
            warn!(binding = name, id, "no tracker bound");
            return None;
        };
        let mut env = PageEnv {
            now: self.clock,
            cookies: &mut self.cookies,
            globals: &self.globals,
        };
        Some(tracker.loaded(id, &mut env))
    }

    /// `<name>.onloadScript(this)` for the script element with `script_id`.
    pub fn script_loaded(&mut self, name: &str, script_id: &str) -> Option<LoadOutcome> {
        let Some(tracker) = self.trackers.lookup_mut(name) else {
            warn!(binding = name, script_id, "no tracker bound");
            return None;
        };
        let Some(script) = self.document.script_mut(script_id) else {
            warn!(script_id, "no such script element");
            return None;
        };
        let mut env = PageEnv {
            now: self.clock,
            cookies: &mut self.cookies,
            globals: &self.globals,
        };
        Some(tracker.onload_script(script, &mut env))
    }

    /// Run the preload polyfill on behalf of the tracker bound at `name`,
    /// over the links that embed emitted. Restarting for the same name
    /// replaces the earlier task.
    pub fn start_polyfill(&mut self, name: impl Into<String>) -> PolyfillState {
        let name = name.into();
        if let Some(pos) = self.polyfills.iter().position(|p| p.binding() == name) {
            warn!(binding = %name, "preload polyfill restarted");
            self.polyfills.remove(pos);
        }
        let (poly, fetches) = PreloadPolyfill::activate(name, &mut self.document, self.clock);
        let state = poly.state();
        self.in_flight.extend(fetches);
        self.polyfills.push(poly);
        state
    }

    pub fn polyfill_state(&self, name: &str) -> Option<PolyfillState> {
        self.polyfills
            .iter()
            .find(|p| p.binding() == name)
            .map(PreloadPolyfill::state)
    }

    /// Move the clock forward, firing every poll tick that falls due, in
    /// time order across all polyfills.
    pub fn advance(&mut self, by: TimeDelta) {
        let target = self.clock + by;
        loop {
            let due = self
                .polyfills
                .iter()
                .enumerate()
                .filter_map(|(i, p)| p.next_tick().map(|at| (at, i)))
                .filter(|&(at, _)| at <= target)
                .min();
            let Some((at, i)) = due else {
                break;
            };
            self.clock = at;
            let fetches = self.polyfills[i].tick(&mut self.document, at);
            self.in_flight.extend(fetches);
        }
        self.clock = target;
    }

    /// `DOMContentLoaded` / `load`, seen by every polyfill.
    pub fn fire_lifecycle(&mut self, event: Lifecycle) {
        debug!(?event, "page lifecycle event");
        for poly in &mut self.polyfills {
            let fetches = poly.on_lifecycle(&mut self.document, event);
            self.in_flight.extend(fetches);
        }
    }

    pub fn in_flight(&self) -> &[PendingFetch] {
        &self.in_flight
    }

    /// Finish the polyfill fetch started for `link_id`: append the fetched
    /// stylesheet and report the link's identifier to the tracker bound by
    /// the embed that owns the link.
    pub fn complete_fetch(&mut self, link_id: &str) -> Option<LoadOutcome> {
        let pos = self.in_flight.iter().position(|f| f.link_id == link_id)?;
        let fetch = self.in_flight.remove(pos);
        self.document.push_link(LinkElement::stylesheet(fetch.href, fetch.media));
        self.signal_loaded(&fetch.binding, &fetch.link_id)
    }

    /// End of the page: trackers and globals go away, cookies persist.
    pub fn unload(mut self) -> CookieJar {
        self.trackers.clear();
        self.globals.clear();
        self.cookies
    }
}
