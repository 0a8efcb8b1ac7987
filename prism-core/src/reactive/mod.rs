//! Reactive Primitives
//!
//! This module implements the core reactive system: observed objects,
//! effects, computed values, watchers, and refs.
//!
//! # Concepts
//!
//! ## Observed objects
//!
//! An [`Obj`] is a shared map or array of [`Value`]s. Wrapping it in a
//! [`Reactive`] handle makes access observable: reads performed inside a
//! running effect register the effect as a dependent of the exact property
//! read, and writes notify the dependents of the property written. Shallow
//! and readonly wrap modes restrict how deep observation goes and whether
//! writes are allowed.
//!
//! ## Effects
//!
//! An [`Effect`] is a re-runnable closure. Its dependencies are discovered
//! by running it; each run starts from a clean slate so dependencies follow
//! the branches actually taken. A scheduler hook intercepts re-runs, and
//! the built-in job queue batches them.
//!
//! ## Computed values and watchers
//!
//! A [`Computed`] is a cached derivation that recomputes only when read
//! after a dependency changed. A [`Watcher`] calls back with new and old
//! values when its source changes.
//!
//! # Implementation Notes
//!
//! Tracking state lives on the [`Runtime`] instance, not in a thread-local,
//! so independent engines can coexist in one process. Dependencies are
//! keyed by an opaque per-object [`Token`] rather than by reference, which
//! keeps the store from extending object lifetimes.
//!
//! This design (automatic dependency tracking with explicit access
//! handles) follows the model popularized by Vue 3 and SolidJS.

mod container;
mod computed;
mod context;
mod effect;
mod refs;
mod runtime;
mod scheduler;
mod store;
mod watch;

pub(crate) mod value;

pub use container::{Reactive, WrapMode};
pub use computed::Computed;
pub use context::PauseGuard;
pub use effect::{Effect, EffectId, EffectOptions, Scheduler};
pub use refs::{to_ref, to_refs, Ref};
pub use runtime::Runtime;
pub use store::{Key, Token};
pub use value::{Obj, Value};
pub use watch::{WatchOptions, WatchSource, Watcher};
