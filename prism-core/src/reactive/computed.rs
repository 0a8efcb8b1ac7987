//! Computed Values
//!
//! A computed value is a lazily cached derivation: the getter runs only
//! when the value is read while dirty, and the cache is invalidated — not
//! recomputed — when a dependency changes. Invalidation rides the scheduler
//! hook: the computed's internal effect is lazy and carries a scheduler
//! that flips the dirty flag and triggers the computed's own synthetic
//! `value` key, so outer effects reading the computed re-run (or get
//! queued) exactly as if they had read a plain property.
//!
//! Reads track unconditionally, even when the cache is fresh, because the
//! outer effect's dependency on the computed exists regardless of whether
//! this particular read recomputed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::effect::{Effect, EffectOptions, Scheduler};
use super::runtime::{Runtime, TriggerOp};
use super::store::{Key, Token};
use super::value::Value;

fn value_key() -> Key {
    Key::Prop("value".to_owned())
}

struct ComputedState {
    /// Synthetic identity the computed exposes to outer effects.
    token: Token,
    dirty: AtomicBool,
    cache: RwLock<Option<Value>>,
}

/// A cached reactive derivation. Clones share the cache.
#[derive(Clone)]
pub struct Computed {
    rt: Runtime,
    state: Arc<ComputedState>,
    effect: Effect,
}

impl Runtime {
    /// Create a computed value from a getter.
    ///
    /// The getter does not run here; the first `value()` call runs it.
    pub fn computed<F>(&self, getter: F) -> Computed
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        let state = Arc::new(ComputedState {
            token: Token::new(),
            dirty: AtomicBool::new(true),
            cache: RwLock::new(None),
        });

        let rt = self.clone();
        let invalidate = state.clone();
        let scheduler: Scheduler = Arc::new(move |_: &Effect| {
            // Mark stale once; repeat invalidations before the next read
            // need no further dispatch.
            if !invalidate.dirty.swap(true, Ordering::SeqCst) {
                rt.trigger(invalidate.token, value_key(), TriggerOp::Set, None, false);
            }
        });

        let effect = self.effect_with(
            getter,
            EffectOptions {
                lazy: true,
                scheduler: Some(scheduler),
            },
        );

        Computed {
            rt: self.clone(),
            state,
            effect,
        }
    }
}

impl Computed {
    /// Current value, recomputing only if a dependency changed since the
    /// last read. Tracked as a read of this computed by the surrounding
    /// effect.
    pub fn value(&self) -> Value {
        if self.state.dirty.swap(false, Ordering::SeqCst) {
            let fresh = self.effect.run();
            *self.state.cache.write() = Some(fresh);
        }
        self.rt.track(self.state.token, value_key());
        self.state.cache.read().clone().unwrap_or(Value::Null)
    }

    /// Whether the next read will recompute.
    pub fn is_dirty(&self) -> bool {
        self.state.dirty.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Computed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("dirty", &self.is_dirty())
            .field("cache", &*self.state.cache.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::value::Obj;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn computes_lazily_and_caches() {
        let rt = Runtime::new();
        let handle = rt.reactive(Obj::map().with("a", 1).with("b", 2));

        let compute_count = Arc::new(AtomicI32::new(0));
        let count_clone = compute_count.clone();
        let handle_clone = handle.clone();
        let sum = rt.computed(move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
            let a = handle_clone.get("a").as_int().unwrap_or(0);
            let b = handle_clone.get("b").as_int().unwrap_or(0);
            Value::Int(a + b)
        });

        // Nothing runs until the first read.
        assert_eq!(compute_count.load(Ordering::SeqCst), 0);
        assert!(sum.is_dirty());

        assert_eq!(sum.value(), Value::Int(3));
        assert_eq!(sum.value(), Value::Int(3));
        assert_eq!(compute_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dependency_change_invalidates() {
        let rt = Runtime::new();
        let handle = rt.reactive(Obj::map().with("a", 1));

        let handle_clone = handle.clone();
        let doubled = rt.computed(move || {
            Value::Int(handle_clone.get("a").as_int().unwrap_or(0) * 2)
        });
        assert_eq!(doubled.value(), Value::Int(2));
        assert!(!doubled.is_dirty());

        handle.set("a", 5).unwrap();
        assert!(doubled.is_dirty());
        assert_eq!(doubled.value(), Value::Int(10));
    }

    #[test]
    fn outer_effect_re_runs_when_computed_changes() {
        let rt = Runtime::new();
        let handle = rt.reactive(Obj::map().with("a", 1));

        let handle_clone = handle.clone();
        let doubled =
            rt.computed(move || Value::Int(handle_clone.get("a").as_int().unwrap_or(0) * 2));

        let seen = Arc::new(AtomicI32::new(0));
        let seen_clone = seen.clone();
        let doubled_clone = doubled.clone();
        let _outer = rt.effect(move || {
            let v = doubled_clone.value().as_int().unwrap_or(0);
            seen_clone.store(v as i32, Ordering::SeqCst);
        });
        assert_eq!(seen.load(Ordering::SeqCst), 2);

        handle.set("a", 4).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn unchanged_write_does_not_invalidate() {
        let rt = Runtime::new();
        let handle = rt.reactive(Obj::map().with("a", 1));

        let handle_clone = handle.clone();
        let c = rt.computed(move || handle_clone.get("a"));
        assert_eq!(c.value(), Value::Int(1));

        handle.set("a", 1).unwrap();
        assert!(!c.is_dirty());
    }
}
