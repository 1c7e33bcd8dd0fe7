//! Bindings: the page's global scope as a name -> value registry with
//! stable, generational handles.
//!
//! Inline markup reaches the tracker through a well-known global name
//! (`sb<master hash>`), and callbacks may be given by the name of a global
//! function. Both lookups go through `Bindings`. Storage is a `SlotMap`, so
//! a handle to an unbound name never aliases a later binding; a hashbrown
//! `HashTable` indexes slots by name using a hash stored alongside each
//! entry, so the index never re-hashes names.

use crate::reentrancy::DebugReentrancy;
use core::hash::BuildHasher;
use hashbrown::hash_table::Entry as TableEntry;
use hashbrown::HashTable;
use slotmap::{new_key_type, SlotMap};
use std::collections::hash_map::RandomState;

new_key_type! {
    /// Stable handle to a bound name.
    pub struct Binding;
}

#[derive(Debug)]
struct Slot<V> {
    name: String,
    value: V,
    hash: u64,
}

pub struct Bindings<V> {
    hasher: RandomState,
    index: HashTable<Binding>,
    slots: SlotMap<Binding, Slot<V>>,
    reentrancy: DebugReentrancy,
}

impl<V> Default for Bindings<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Bindings<V> {
    pub fn new() -> Self {
        Self {
            hasher: RandomState::new(),
            index: HashTable::new(),
            slots: SlotMap::with_key(),
            reentrancy: DebugReentrancy::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn find(&self, name: &str) -> Option<Binding> {
        let _busy = self.reentrancy.enter();
        let hash = self.hasher.hash_one(name);
        self.index
            .find(hash, |&b| self.slots.get(b).is_some_and(|s| s.name == name))
            .copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Bind `name` to `value`. Rebinding an existing name keeps its handle
    /// and returns the displaced value, like redeclaring a global `var`.
    pub fn bind(&mut self, name: impl Into<String>, value: V) -> (Binding, Option<V>) {
        let _busy = self.reentrancy.enter();
        let name = name.into();
        let hash = self.hasher.hash_one(name.as_str());
        let slots = &mut self.slots;
        match self.index.entry(
            hash,
            |&b| slots.get(b).is_some_and(|s| s.name == name),
            |&b| slots.get(b).map_or(0, |s| s.hash),
        ) {
            TableEntry::Occupied(o) => {
                let b = *o.get();
                let prev = slots
                    .get_mut(b)
                    .map(|s| core::mem::replace(&mut s.value, value));
                (b, prev)
            }
            TableEntry::Vacant(v) => {
                let b = slots.insert(Slot { name, value, hash });
                v.insert(b);
                (b, None)
            }
        }
    }

    pub fn get(&self, b: Binding) -> Option<&V> {
        let _busy = self.reentrancy.enter();
        self.slots.get(b).map(|s| &s.value)
    }

    pub fn get_mut(&mut self, b: Binding) -> Option<&mut V> {
        let _busy = self.reentrancy.enter();
        self.slots.get_mut(b).map(|s| &mut s.value)
    }

    pub fn name(&self, b: Binding) -> Option<&str> {
        let _busy = self.reentrancy.enter();
        self.slots.get(b).map(|s| s.name.as_str())
    }

    pub fn lookup(&self, name: &str) -> Option<&V> {
        let b = self.find(name)?;
        self.get(b)
    }

    pub fn lookup_mut(&mut self, name: &str) -> Option<&mut V> {
        let b = self.find(name)?;
        self.get_mut(b)
    }

    pub fn unbind(&mut self, b: Binding) -> Option<(String, V)> {
        let _busy = self.reentrancy.enter();
        let slot = self.slots.remove(b)?;
        if let Ok(entry) = self.index.find_entry(slot.hash, |&k| k == b) {
            entry.remove();
        }
        Some((slot.name, slot.value))
    }

    /// Drop every binding; outstanding handles go stale.
    pub fn clear(&mut self) {
        let _busy = self.reentrancy.enter();
        self.index.clear();
        self.slots.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (Binding, &str, &V)> {
        self.slots.iter().map(|(b, s)| (b, s.name.as_str(), &s.value))
    }
}
