//! Resource tracker: the completion state machine embedded in each page.
//!
//! The tracker holds the identifiers it still expects to hear about. Every
//! completion signal (script `onload`, legacy `readystatechange`, style
//! `onload`, or a polyfill fetch) funnels into [`Tracker::loaded`]. When the
//! pending set stops blocking, the tracker completes exactly once: it writes
//! the completion cookie (if it has a master hash) and runs the callback.
//!
//! States:
//!
//! ```text
//! Pending --loaded(member), set satisfied--> Completed
//!    ^  |                                      |
//!    +--+ loaded(member), still blocked        +--loaded(*)--> Completed (no effects)
//! ```
//!
//! A signal for an identifier that is not pending changes nothing, not even
//! for an empty or already-satisfied set: completion is only ever evaluated
//! right after a pending entry has been removed.

use crate::callback::{Callback, GlobalFn};
use crate::cookie::{cookie_name, CompletionCookie};
use crate::resource::{PendingSet, Removal};
use chrono::{DateTime, Utc};
use tracing::{debug, trace};

/// Host services the tracker needs when it completes.
pub trait Environment {
    fn now(&self) -> DateTime<Utc>;
    fn set_cookie(&mut self, cookie: CompletionCookie);
    /// Look up a function bound in the global scope.
    fn resolve_global(&self, name: &str) -> Option<GlobalFn>;
}

/// A script element as seen by its load hooks.
pub trait ScriptHandle {
    fn id(&self) -> &str;
    /// Legacy engines report progress through `readyState`; modern ones
    /// leave it unset.
    fn ready_state(&self) -> Option<&str>;
    /// Remove both the `load` and `readystatechange` hooks.
    fn detach_hooks(&mut self);
}

/// What a single completion signal did.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    /// `readyState` was present and not yet `complete`.
    NotReady,
    /// The identifier was not pending.
    Unknown,
    /// Removed; `required` entries still block completion.
    Pending { required: usize },
    /// This signal completed the tracker.
    Completed,
    /// Removed, but the tracker had completed before.
    AlreadyCompleted,
}

#[derive(Debug)]
pub struct Tracker {
    pending: PendingSet,
    master_hash: Option<String>,
    cookie_slot: Option<String>,
    callback: Callback,
    completed: bool,
}

impl Tracker {
    /// Empty strings for the hash or slot count as absent. An empty set is
    /// not completed here; only a `loaded` signal can complete a tracker.
    pub fn new(
        pending: PendingSet,
        master_hash: Option<String>,
        cookie_slot: Option<String>,
        callback: Callback,
    ) -> Self {
        let master_hash = master_hash.filter(|h| !h.is_empty());
        let cookie_slot = cookie_slot.filter(|s| !s.is_empty());
        debug!(
            resources = pending.len(),
            required = pending.required(),
            form = ?pending.form(),
            master_hash = master_hash.as_deref().unwrap_or(""),
            "registered resources"
        );
        Self {
            pending,
            master_hash,
            cookie_slot,
            callback,
            completed: false,
        }
    }

    pub fn pending(&self) -> &PendingSet {
        &self.pending
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn master_hash(&self) -> Option<&str> {
        self.master_hash.as_deref()
    }

    pub fn cookie_slot(&self) -> Option<&str> {
        self.cookie_slot.as_deref()
    }

    pub fn cookie_name(&self) -> String {
        cookie_name(self.cookie_slot.as_deref())
    }

    pub fn callback(&self) -> &Callback {
        &self.callback
    }

    /// Load hook for script elements. Proceeds only once the script is
    /// really done, then unhooks it so neither path can fire again.
    pub fn onload_script<H, E>(&mut self, script: &mut H, env: &mut E) -> LoadOutcome
    where
        H: ScriptHandle + ?Sized,
        E: Environment + ?Sized,
    {
        match script.ready_state() {
            None | Some("complete") => {}
            Some(state) => {
                trace!(id = script.id(), state, "script not complete yet");
                return LoadOutcome::NotReady;
            }
        }
        script.detach_hooks();
        let id = script.id().to_owned();
        self.loaded(&id, env)
    }

    /// Record that `id` has finished loading.
    pub fn loaded<E>(&mut self, id: &str, env: &mut E) -> LoadOutcome
    where
        E: Environment + ?Sized,
    {
        let removal = self.pending.remove(id);
        if removal == Removal::Absent {
            trace!(id, "ignoring signal for a resource that is not pending");
            return LoadOutcome::Unknown;
        }

        let required = self.pending.required();
        debug!(
            id,
            required_removed = removal.was_required(),
            required,
            "resource loaded"
        );
        if required > 0 {
            return LoadOutcome::Pending { required };
        }
        if self.completed {
            return LoadOutcome::AlreadyCompleted;
        }
        self.completed = true;
        self.complete(env);
        LoadOutcome::Completed
    }

    fn complete<E>(&mut self, env: &mut E)
    where
        E: Environment + ?Sized,
    {
        if let Some(hash) = &self.master_hash {
            let cookie = CompletionCookie::new(self.cookie_slot.as_deref(), hash, env.now());
            debug!(cookie = %cookie, "setting completion cookie");
            env.set_cookie(cookie);
        }

        if let Some(f) = self.callback.resolve(|name| env.resolve_global(name)) {
            debug!("running completion callback");
            f();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Weight;
    use chrono::TimeZone;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Host {
        cookies: Vec<CompletionCookie>,
        globals: Vec<(String, GlobalFn)>,
    }

    impl Environment for Host {
        fn now(&self) -> DateTime<Utc> {
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
        }
        fn set_cookie(&mut self, cookie: CompletionCookie) {
            self.cookies.push(cookie);
        }
        fn resolve_global(&self, name: &str) -> Option<GlobalFn> {
            self.globals
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, f)| Rc::clone(f))
        }
    }

    struct Script {
        id: String,
        ready_state: Option<&'static str>,
        hooked: bool,
    }

    impl ScriptHandle for Script {
        fn id(&self) -> &str {
            &self.id
        }
        fn ready_state(&self) -> Option<&str> {
            self.ready_state
        }
        fn detach_hooks(&mut self) {
            self.hooked = false;
        }
    }

    fn counter() -> (Rc<Cell<u32>>, Callback) {
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        (hits, Callback::direct(move || h.set(h.get() + 1)))
    }

    #[test]
    fn completes_once_after_last_distinct_signal() {
        let mut host = Host::default();
        let (hits, cb) = counter();
        let mut t = Tracker::new(PendingSet::list(["a", "b"]), Some("m".into()), None, cb);

        assert_eq!(t.loaded("a", &mut host), LoadOutcome::Pending { required: 1 });
        assert_eq!(t.loaded("a", &mut host), LoadOutcome::Unknown);
        assert_eq!(t.loaded("b", &mut host), LoadOutcome::Completed);
        assert_eq!(t.loaded("b", &mut host), LoadOutcome::Unknown);
        assert!(t.is_completed());
        assert_eq!(hits.get(), 1);
        assert_eq!(host.cookies.len(), 1);
        assert_eq!(host.cookies[0].name, "sb");
    }

    #[test]
    fn legacy_ready_state_waits_for_complete() {
        let mut host = Host::default();
        let mut t = Tracker::new(PendingSet::list(["s1"]), None, None, Callback::None);
        let mut script = Script {
            id: "s1".into(),
            ready_state: Some("loading"),
            hooked: true,
        };

        assert_eq!(t.onload_script(&mut script, &mut host), LoadOutcome::NotReady);
        assert!(script.hooked);
        assert!(!t.is_completed());

        script.ready_state = Some("complete");
        assert_eq!(t.onload_script(&mut script, &mut host), LoadOutcome::Completed);
        assert!(!script.hooked);
    }

    #[test]
    fn modern_script_without_ready_state_completes() {
        let mut host = Host::default();
        let mut t = Tracker::new(PendingSet::list(["s1"]), None, None, Callback::None);
        let mut script = Script {
            id: "s1".into(),
            ready_state: None,
            hooked: true,
        };
        assert_eq!(t.onload_script(&mut script, &mut host), LoadOutcome::Completed);
        assert!(!script.hooked);
    }

    #[test]
    fn no_master_hash_means_no_cookie() {
        let mut host = Host::default();
        let (hits, cb) = counter();
        let mut t = Tracker::new(PendingSet::list(["a"]), Some(String::new()), None, cb);
        assert_eq!(t.master_hash(), None);
        assert_eq!(t.loaded("a", &mut host), LoadOutcome::Completed);
        assert!(host.cookies.is_empty());
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn prefetch_removal_after_completion_is_inert() {
        let mut host = Host::default();
        let (hits, cb) = counter();
        let set = PendingSet::weighted([("a", Weight::Required), ("b", Weight::Prefetch)]);
        let mut t = Tracker::new(set, Some("m".into()), Some("main".into()), cb);

        assert_eq!(t.loaded("a", &mut host), LoadOutcome::Completed);
        assert_eq!(t.loaded("b", &mut host), LoadOutcome::AlreadyCompleted);
        assert_eq!(hits.get(), 1);
        assert_eq!(host.cookies.len(), 1);
        assert_eq!(t.cookie_name(), "sb_main");
    }

    #[test]
    fn unresolved_named_callback_is_skipped() {
        let mut host = Host::default();
        let mut t = Tracker::new(PendingSet::list(["a"]), None, None, Callback::named("missing"));
        assert_eq!(t.loaded("a", &mut host), LoadOutcome::Completed);
        assert_eq!(t.callback().name(), Some("missing"));
    }
}
