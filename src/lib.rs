//! shortbread: asynchronous, non-blocking loading of CSS and JavaScript
//! with a cookie that tells the server when everything is cached.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: a first visit gets an *initial* fragment that loads resources
//!   without blocking rendering and tracks their completion in the page;
//!   once every resource has loaded, a completion cookie lets the server
//!   hand out the *subsequent* fragment (plain synchronous tags) instead.
//! - Layers:
//!   - `PendingSet`: the outstanding identifiers, as a list or as a
//!     weighted map where weight 0 marks prefetch-only resources.
//!   - `Tracker`: one-shot completion state machine over a `PendingSet`;
//!     writes the cookie and runs the callback exactly once.
//!   - `PreloadPolyfill`: a cooperative polling task that fetches style
//!     preloads by hand on engines without native `rel=preload`.
//!   - `Page`: a page-load context hosting trackers (bound by name in
//!     `Bindings`), global functions, cookies and the polyfill.
//!   - `fragment` / `bundle`: build-side generation of both fragments and
//!     the embedded client script.
//!
//! Constraints
//! - Single-threaded: every mutation happens inside one dispatched event;
//!   page-side types are `!Send`/`!Sync` (they hold `Rc`).
//! - Completion is evaluated only after a pending entry is removed. Signals
//!   for unknown or already-removed identifiers change nothing.
//! - A resource that never loads leaves its tracker pending forever; that
//!   is the accepted degraded mode (no cookie, no callback), not an error.
//!
//! Duplicate handling
//! - One signal clears every occurrence of its identifier. The list form
//!   filters all matching entries; the weighted form has unique keys by
//!   construction. Both forms therefore agree on duplicates.
//!
//! Notes and non-goals
//! - The server-side cookie comparison lives outside this crate.
//! - No retries and no scheduling beyond what the browser's preload does.

pub mod bindings;
pub mod bundle;
pub mod callback;
pub mod config;
pub mod cookie;
pub mod dom;
pub mod error;
pub mod fragment;
pub mod page;
pub mod polyfill;
mod reentrancy;
pub mod resource;
pub mod script;
pub mod tracker;

// Public surface
pub use bindings::{Binding, Bindings};
pub use bundle::{AssetKind, Bundle, Classifier, OutputFile, StreamInput};
pub use callback::{Callback, GlobalFn};
pub use config::Config;
pub use cookie::{cookie_name, CompletionCookie, CookieJar, COOKIE_LIFETIME_MS};
pub use dom::{Document, LinkElement, PreloadProbe, PreloadSupport, ScriptElement};
pub use error::{Error, Result};
pub use fragment::{generate, Asset, AssetRole, FragmentOptions, Fragments};
pub use page::Page;
pub use polyfill::{
    poll_pending_preloads, supports_native_preload, CancellationToken, Lifecycle, PendingFetch,
    PolyfillState, PreloadPolyfill, POLL_INTERVAL_MS,
};
pub use resource::{PendingSet, Removal, ResourceId, SetForm, Weight};
pub use tracker::{Environment, LoadOutcome, ScriptHandle, Tracker};
