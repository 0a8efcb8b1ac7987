//! Dependency Store
//!
//! The store is the two-level bookkeeping structure at the bottom of the
//! engine: observed object (by token) → property key → ordered set of
//! effect ids. It holds no logic beyond creating intermediate maps on first
//! access and removing edges during effect cleanup.
//!
//! # Tokens
//!
//! Observed objects are identified by an opaque [`Token`] allocated from an
//! atomic counter when the object is created. The store never holds the
//! object itself, so it cannot extend the object's lifetime. Entries for a
//! token accumulate until effect cleanup removes them or the caller evicts
//! the whole bucket via `Runtime::release`.
//!
//! # Ordering
//!
//! Dependency sets are insertion-ordered (`IndexSet`). Trigger dispatch
//! iterates them in that order, which keeps re-execution deterministic for
//! a fixed dependency set.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::{IndexMap, IndexSet};

use super::effect::EffectId;

/// Opaque identity token for an observed object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token(u64);

impl Token {
    /// Allocate a fresh token.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw token value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for Token {
    fn default() -> Self {
        Self::new()
    }
}

/// A property key on an observed object.
///
/// Besides plain named fields and array positions there are two synthetic
/// keys: [`Key::Iterate`] stands for "the set of own keys of this map"
/// (enumeration has no single field to depend on), and [`Key::Length`] is
/// both the array length field and the array enumeration sentinel, since
/// array membership is governed by length.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// A named field of a map.
    Prop(String),
    /// A position in an array.
    Index(usize),
    /// The array length field.
    Length,
    /// The map enumeration sentinel.
    Iterate,
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Prop(name.to_owned())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Prop(name)
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

/// The two-level dependency mapping.
pub(crate) struct DepStore {
    buckets: HashMap<Token, IndexMap<Key, IndexSet<EffectId>>>,
}

impl DepStore {
    pub fn new() -> Self {
        Self {
            buckets: HashMap::new(),
        }
    }

    /// Record that `effect` depends on `(token, key)`.
    pub fn track(&mut self, token: Token, key: Key, effect: EffectId) {
        self.buckets
            .entry(token)
            .or_default()
            .entry(key)
            .or_default()
            .insert(effect);
    }

    /// Remove a single reverse edge, recorded during a previous run of
    /// `effect`. Empty sets are left in place; the store has no eviction
    /// policy of its own.
    pub fn remove(&mut self, token: Token, key: &Key, effect: EffectId) {
        if let Some(keys) = self.buckets.get_mut(&token) {
            if let Some(deps) = keys.get_mut(key) {
                deps.shift_remove(&effect);
            }
        }
    }

    /// Append the effects tracked on `(token, key)` to `out`, preserving
    /// their insertion order.
    pub fn collect_into(&self, token: Token, key: &Key, out: &mut IndexSet<EffectId>) {
        if let Some(deps) = self.buckets.get(&token).and_then(|keys| keys.get(key)) {
            out.extend(deps.iter().copied());
        }
    }

    /// Iterate every tracked key of `token` with its dependency set. Used
    /// by the array length-truncation rule to find index keys at or beyond
    /// the new length.
    pub fn keys_of<'a>(
        &'a self,
        token: Token,
    ) -> impl Iterator<Item = (&'a Key, &'a IndexSet<EffectId>)> + 'a {
        self.buckets.get(&token).into_iter().flat_map(|keys| keys.iter())
    }

    /// Drop the whole bucket for `token`.
    pub fn release(&mut self, token: Token) {
        self.buckets.remove(&token);
    }
}
