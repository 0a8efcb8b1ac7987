//! Watchers
//!
//! A watcher observes a source — a getter closure or a whole reactive
//! object — and calls back with `(new, old)` when the source changes.
//! Internally it is a lazy effect whose scheduler is the job: run the
//! source, swap the remembered previous value, invoke the callback.
//!
//! Watching an object deep-traverses it on every run, reading each nested
//! property so the watcher depends on all of them. A seen-set breaks
//! reference cycles during the traversal.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use super::container::Reactive;
use super::effect::{Effect, EffectOptions, Scheduler};
use super::runtime::Runtime;
use super::store::Token;
use super::value::Value;

/// What a watcher observes.
pub enum WatchSource {
    /// An arbitrary tracked computation; its result is what the callback
    /// sees.
    Getter(Box<dyn Fn() -> Value + Send + Sync>),
    /// A reactive object, observed deeply.
    Object(Reactive),
}

impl WatchSource {
    pub fn getter<F>(f: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        WatchSource::Getter(Box::new(f))
    }
}

impl From<Reactive> for WatchSource {
    fn from(handle: Reactive) -> Self {
        WatchSource::Object(handle)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WatchOptions {
    /// Fire the callback once at registration with `old` absent, instead of
    /// waiting for the first change.
    pub immediate: bool,
}

/// Handle to a registered watcher. Dropping it disposes the watcher.
pub struct Watcher {
    effect: Effect,
}

impl Watcher {
    /// The underlying effect, for introspection.
    pub fn effect(&self) -> &Effect {
        &self.effect
    }
}

impl Runtime {
    /// Watch a source and call back on change with the new and previous
    /// result. `old` is `None` only for an `immediate` first call.
    pub fn watch<C>(
        &self,
        source: impl Into<WatchSource>,
        callback: C,
        options: WatchOptions,
    ) -> Watcher
    where
        C: FnMut(Value, Option<Value>) + Send + 'static,
    {
        let getter: Box<dyn Fn() -> Value + Send + Sync> = match source.into() {
            WatchSource::Getter(f) => f,
            WatchSource::Object(handle) => {
                Box::new(move || traverse(&handle, &mut HashSet::new()))
            }
        };

        let callback = Arc::new(Mutex::new(callback));
        let previous: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));

        let job: Scheduler = {
            let callback = callback.clone();
            let previous = previous.clone();
            Arc::new(move |effect: &Effect| {
                let fresh = effect.run();
                let old = previous.lock().take();
                {
                    let mut cb = callback.lock();
                    (cb)(fresh.clone(), old);
                }
                *previous.lock() = Some(fresh);
            })
        };

        let effect = self.effect_with(
            getter,
            EffectOptions {
                lazy: true,
                scheduler: Some(job.clone()),
            },
        );

        if options.immediate {
            job(&effect);
        } else {
            // Baseline run: establish dependencies and the first `old`.
            *previous.lock() = Some(effect.run());
        }

        Watcher { effect }
    }
}

/// Visit every reachable property of `handle`, tracking each read.
/// Returns the raw object so the callback sees the (shared, mutable)
/// target; the value of a deep watch is the object itself.
fn traverse(handle: &Reactive, seen: &mut HashSet<Token>) -> Value {
    if !seen.insert(handle.token()) {
        return Value::Obj(handle.raw());
    }
    for key in handle.keys() {
        // `child` performs the tracked read; recurse into object values.
        if let Some(child) = handle.child(key) {
            traverse(&child, seen);
        }
    }
    Value::Obj(handle.raw())
}
