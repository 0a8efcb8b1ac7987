//! Reactive Runtime
//!
//! The runtime is the central coordinator: it owns the dependency store,
//! the active-effect stack, the effect registry, and the batched job queue,
//! and implements the track/trigger protocol that connects property access
//! to effect re-execution.
//!
//! # How it works
//!
//! 1. Registering an effect records it weakly and (unless lazy) runs it
//!    once to establish dependencies.
//!
//! 2. While an effect runs, every tracked read calls [`Runtime::track`],
//!    which records a forward edge in the store and a reverse edge on the
//!    effect for later cleanup.
//!
//! 3. A mutation calls trigger with the changed key. The runtime computes
//!    the affected effect set, excludes the effect currently on top of the
//!    stack (the re-entrancy guard that stops `n = n + 1` inside its own
//!    effect from recursing), and dispatches each effect — to its scheduler
//!    if it has one, otherwise by running it synchronously in stable
//!    insertion order.
//!
//! # Threading
//!
//! The runtime handle is a cheap `Arc` clone and the interior is behind
//! locks, but execution is cooperative and single-threaded: trigger runs
//! effects on the caller's stack, and no lock is held while user closures
//! execute.

use std::sync::{Arc, Weak};

use dashmap::DashMap;
use indexmap::IndexSet;
use parking_lot::{Mutex, RwLock};

use super::context::{ActiveStack, PauseGuard};
use super::effect::{Effect, EffectId, EffectInner, EffectOptions};
use super::scheduler::JobQueue;
use super::store::{DepStore, Key, Token};
use super::value::{Obj, Value};

/// Classification of a mutation, used to widen the triggered set for
/// structural changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TriggerOp {
    /// An existing key's value changed.
    Set,
    /// A key came into existence (new map field, new array index).
    Add,
    /// An own key was removed.
    Delete,
}

pub(crate) struct RuntimeInner {
    pub(crate) store: RwLock<DepStore>,
    pub(crate) registry: DashMap<EffectId, Weak<EffectInner>>,
    pub(crate) stack: ActiveStack,
    pub(crate) queue: Mutex<JobQueue>,
}

/// A reactive engine instance.
///
/// All state is per-instance; independent runtimes do not observe each
/// other. Handles are cheap clones sharing the same engine.
#[derive(Clone)]
pub struct Runtime {
    pub(crate) inner: Arc<RuntimeInner>,
}

impl Runtime {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RuntimeInner {
                store: RwLock::new(DepStore::new()),
                registry: DashMap::new(),
                stack: ActiveStack::new(),
                queue: Mutex::new(JobQueue::new()),
            }),
        }
    }

    /// Register a side-effecting closure and run it once immediately.
    pub fn effect<F>(&self, f: F) -> Effect
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.effect_with(
            move || {
                f();
                Value::Null
            },
            EffectOptions::default(),
        )
    }

    /// Register an effect with options. Unless `lazy`, it runs once before
    /// this returns. The handle forces re-runs and carries the closure's
    /// result.
    pub fn effect_with<F>(&self, f: F, options: EffectOptions) -> Effect
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        let inner = EffectInner::new(Box::new(f), options.scheduler);
        self.inner.registry.insert(inner.id, Arc::downgrade(&inner));
        let handle = Effect::from_parts(self.clone(), inner);
        if !options.lazy {
            handle.run();
        }
        handle
    }

    /// The runner: cleanup stale edges, push the frame, invoke, pop.
    ///
    /// The frame guard pops even when the closure panics, so an unwinding
    /// user closure cannot corrupt the active-effect stack.
    pub(crate) fn run_effect(&self, inner: &Arc<EffectInner>) -> Value {
        self.cleanup(inner);
        let _frame = self.inner.stack.enter(inner.clone());
        (inner.body)()
    }

    /// Remove this effect from every dependency set its previous run
    /// recorded, then clear the record. Without this, a conditional read
    /// pattern would retain stale edges to branches no longer taken.
    fn cleanup(&self, inner: &EffectInner) {
        let edges = std::mem::take(&mut *inner.edges.lock());
        if edges.is_empty() {
            return;
        }
        let mut store = self.inner.store.write();
        for (token, key) in edges {
            store.remove(token, &key, inner.id);
        }
    }

    /// Record that the currently running effect read `(token, key)`.
    /// No-op when no effect is running or tracking is paused.
    pub(crate) fn track(&self, token: Token, key: Key) {
        if self.inner.stack.is_paused() {
            return;
        }
        let Some(active) = self.inner.stack.current() else {
            return;
        };
        self.inner.store.write().track(token, key.clone(), active.id);
        active.edges.lock().push((token, key));
    }

    /// True when reads are currently being recorded.
    pub fn is_tracking(&self) -> bool {
        self.inner.stack.is_tracking()
    }

    /// Suppress tracking until the returned guard drops. Used internally by
    /// array mutators, whose bookkeeping reads must not become dependencies
    /// of the calling effect; exposed for callers that need an untracked
    /// read window.
    pub fn pause_tracking(&self) -> PauseGuard<'_> {
        self.inner.stack.pause()
    }

    pub(crate) fn active_effect(&self) -> Option<EffectId> {
        self.inner.stack.current().map(|effect| effect.id)
    }

    /// Dispatch the effects affected by a single-key mutation.
    pub(crate) fn trigger(
        &self,
        token: Token,
        key: Key,
        op: TriggerOp,
        new_len: Option<usize>,
        is_array: bool,
    ) {
        self.trigger_keys(token, vec![(key, op)], new_len, is_array);
    }

    /// Dispatch the effects affected by a mutation touching several keys at
    /// once (structural array operations). The union is deduplicated so
    /// each affected effect runs exactly once per dispatch.
    ///
    /// The triggered set for each key is widened by the structural rules:
    /// map `Add`/`Delete` pulls in enumeration ([`Key::Iterate`]) deps,
    /// a new array index pulls in [`Key::Length`] deps, and a `Length`
    /// write pulls in every index at or beyond the new length (those
    /// elements are now gone).
    pub(crate) fn trigger_keys(
        &self,
        token: Token,
        keys: Vec<(Key, TriggerOp)>,
        new_len: Option<usize>,
        is_array: bool,
    ) {
        let mut ids: IndexSet<EffectId> = IndexSet::new();
        {
            let store = self.inner.store.read();
            for (key, op) in &keys {
                store.collect_into(token, key, &mut ids);
                match op {
                    TriggerOp::Add | TriggerOp::Delete if !is_array => {
                        store.collect_into(token, &Key::Iterate, &mut ids);
                    }
                    TriggerOp::Add if is_array && matches!(key, Key::Index(_)) => {
                        store.collect_into(token, &Key::Length, &mut ids);
                    }
                    _ => {}
                }
                if is_array && *key == Key::Length {
                    let bound = new_len.unwrap_or(0);
                    for (tracked, deps) in store.keys_of(token) {
                        if let Key::Index(i) = tracked {
                            if *i >= bound {
                                ids.extend(deps.iter().copied());
                            }
                        }
                    }
                }
            }
        }

        // Re-entrancy guard: the effect currently executing never triggers
        // itself.
        if let Some(active) = self.active_effect() {
            ids.shift_remove(&active);
        }
        if ids.is_empty() {
            return;
        }

        // Upgrade to strong handles before running anything, and prune
        // registry entries whose effects have been dropped.
        let mut runnable = Vec::with_capacity(ids.len());
        for id in ids {
            let upgraded = self.inner.registry.get(&id).and_then(|weak| weak.upgrade());
            match upgraded {
                Some(inner) => runnable.push(inner),
                None => {
                    self.inner.registry.remove(&id);
                }
            }
        }

        tracing::trace!(token = token.raw(), effects = runnable.len(), "trigger dispatch");

        for inner in runnable {
            match inner.scheduler.clone() {
                Some(schedule) => schedule(&Effect::from_parts(self.clone(), inner)),
                None => {
                    self.run_effect(&inner);
                }
            }
        }
    }

    /// Evict every dependency entry for an observed object. The store never
    /// holds the object itself; this reclaims the bookkeeping once the
    /// caller knows the object will not be observed again.
    pub fn release(&self, obj: &Obj) {
        self.inner.store.write().release(obj.token());
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}
