//! Completion callback with deferred, by-name binding.
//!
//! A callback is either a direct function or the name of a global function.
//! Names are resolved at the moment the tracker completes rather than at
//! construction, so the function may be defined after the tracker. A name
//! that resolves is replaced by the function it names; one that doesn't is
//! skipped silently.

use core::fmt;
use std::rc::Rc;
use tracing::trace;

/// A function reachable from the page's global scope.
pub type GlobalFn = Rc<dyn Fn()>;

#[derive(Clone, Default)]
pub enum Callback {
    #[default]
    None,
    Direct(GlobalFn),
    NamedGlobal(String),
}

impl Callback {
    pub fn direct<F>(f: F) -> Self
    where
        F: Fn() + 'static,
    {
        Callback::Direct(Rc::new(f))
    }

    pub fn named(name: impl Into<String>) -> Self {
        Callback::NamedGlobal(name.into())
    }

    /// Name to embed in generated markup, if this callback is by-name.
    pub fn name(&self) -> Option<&str> {
        match self {
            Callback::NamedGlobal(name) => Some(name),
            _ => None,
        }
    }

    /// Bind a by-name callback through `lookup`, caching the result.
    /// Returns the callable, if any.
    pub(crate) fn resolve<L>(&mut self, lookup: L) -> Option<GlobalFn>
    where
        L: FnOnce(&str) -> Option<GlobalFn>,
    {
        if let Callback::NamedGlobal(name) = self {
            if name.is_empty() {
                return None;
            }
            match lookup(name) {
                Some(f) => *self = Callback::Direct(f),
                None => {
                    trace!(callback = %name, "callback name does not resolve to a global function");
                    return None;
                }
            }
        }
        match self {
            Callback::Direct(f) => Some(Rc::clone(f)),
            _ => None,
        }
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callback::None => f.write_str("None"),
            Callback::Direct(_) => f.write_str("Direct(<fn>)"),
            Callback::NamedGlobal(name) => f.debug_tuple("NamedGlobal").field(name).finish(),
        }
    }
}
