//! Resource identifiers and the outstanding-resource set.
//!
//! A `PendingSet` comes in two shapes that share one contract:
//! - `List`: ordered identifiers. A completion signal clears *every*
//!   occurrence of its identifier, so duplicates in the initial list
//!   (e.g. two assets with identical content) are settled by one signal.
//! - `Weighted`: identifier -> weight. Weight 0 marks a prefetch-only
//!   resource that never blocks completion; weight 1 is required.
//!
//! Both shapes remove by identifier and report whether the removed entry
//! was required, so the tracker never branches on the shape itself.

use core::borrow::Borrow;
use core::fmt;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

/// Opaque token naming one tracked resource (in practice a content digest).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ResourceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ResourceId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for ResourceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Contribution of a resource to the "required" total.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Weight {
    /// Prefetched, nice-to-have; never blocks completion.
    Prefetch,
    /// Critical path; must signal before completion fires.
    Required,
}

impl Weight {
    pub fn value(self) -> u8 {
        match self {
            Weight::Prefetch => 0,
            Weight::Required => 1,
        }
    }
}

/// Which of the two set shapes is in use.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SetForm {
    List,
    Weighted,
}

/// Result of removing an identifier from a `PendingSet`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Removal {
    /// The identifier was not (or no longer) pending.
    Absent,
    /// At least one entry was removed.
    Removed { required: bool },
}

impl Removal {
    pub fn was_required(self) -> bool {
        matches!(self, Removal::Removed { required: true })
    }
}

/// Weighted map with a running count of required entries.
#[derive(Clone, Debug, Default)]
pub struct WeightedSet {
    entries: HashMap<ResourceId, Weight>,
    required: usize,
}

impl WeightedSet {
    fn from_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Weight)>,
        K: Into<ResourceId>,
    {
        let mut set = WeightedSet::default();
        for (id, weight) in entries {
            // Duplicate keys collapse to one entry; `Required` dominates.
            let slot = set.entries.entry(id.into()).or_insert(Weight::Prefetch);
            if weight == Weight::Required && *slot != Weight::Required {
                *slot = Weight::Required;
                set.required += 1;
            }
        }
        set
    }

    fn remove(&mut self, id: &str) -> Removal {
        match self.entries.remove(id) {
            None => Removal::Absent,
            Some(weight) => {
                let required = weight == Weight::Required;
                if required {
                    self.required -= 1;
                }
                debug_assert_eq!(
                    self.required,
                    self.entries
                        .values()
                        .filter(|w| **w == Weight::Required)
                        .count()
                );
                Removal::Removed { required }
            }
        }
    }

    pub fn weight(&self, id: &str) -> Option<Weight> {
        self.entries.get(id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ResourceId, Weight)> {
        self.entries.iter().map(|(k, w)| (k, *w))
    }
}

/// Identifiers the tracker still expects to see completed.
#[derive(Clone, Debug)]
pub enum PendingSet {
    List(Vec<ResourceId>),
    Weighted(WeightedSet),
}

impl Default for PendingSet {
    fn default() -> Self {
        PendingSet::List(Vec::new())
    }
}

impl PendingSet {
    pub fn list<I, K>(ids: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<ResourceId>,
    {
        PendingSet::List(ids.into_iter().map(Into::into).collect())
    }

    pub fn weighted<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Weight)>,
        K: Into<ResourceId>,
    {
        PendingSet::Weighted(WeightedSet::from_entries(entries))
    }

    pub fn form(&self) -> SetForm {
        match self {
            PendingSet::List(_) => SetForm::List,
            PendingSet::Weighted(_) => SetForm::Weighted,
        }
    }

    /// Remove `id`. In list form every matching entry goes at once.
    pub fn remove(&mut self, id: &str) -> Removal {
        match self {
            PendingSet::List(ids) => {
                let before = ids.len();
                ids.retain(|r| r.as_str() != id);
                if ids.len() == before {
                    Removal::Absent
                } else {
                    Removal::Removed { required: true }
                }
            }
            PendingSet::Weighted(set) => set.remove(id),
        }
    }

    /// Number of outstanding entries that still block completion.
    pub fn required(&self) -> usize {
        match self {
            PendingSet::List(ids) => ids.len(),
            PendingSet::Weighted(set) => set.required,
        }
    }

    pub fn is_satisfied(&self) -> bool {
        self.required() == 0
    }

    /// Number of outstanding entries, blocking or not.
    pub fn len(&self) -> usize {
        match self {
            PendingSet::List(ids) => ids.len(),
            PendingSet::Weighted(set) => set.entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &str) -> bool {
        match self {
            PendingSet::List(ids) => ids.iter().any(|r| r.as_str() == id),
            PendingSet::Weighted(set) => set.entries.contains_key(id),
        }
    }

    /// Outstanding identifiers as a JSON literal for the client-side
    /// instantiation: an array in list form, an object of weights otherwise.
    /// Object keys come out sorted so generated markup is deterministic.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            PendingSet::List(ids) => serde_json::Value::Array(
                ids.iter()
                    .map(|id| serde_json::Value::String(id.as_str().to_owned()))
                    .collect(),
            ),
            PendingSet::Weighted(set) => serde_json::Value::Object(
                set.iter()
                    .map(|(id, w)| (id.as_str().to_owned(), serde_json::Value::from(w.value())))
                    .collect(),
            ),
        }
    }
}
