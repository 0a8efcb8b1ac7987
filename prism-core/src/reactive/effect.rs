//! Effect Implementation
//!
//! An effect is a re-runnable closure whose property reads are tracked.
//! When any of those properties later changes, the effect is re-invoked —
//! directly, or through its scheduler if it carries one.
//!
//! # How effects run
//!
//! Each run: (1) remove the effect from every dependency set recorded by
//! its previous run and clear that record, (2) push it onto the runtime's
//! active-effect stack, (3) invoke the closure and capture its result,
//! (4) pop the stack. The cleanup step is what keeps conditional reads
//! honest: an effect that reads `a ? b : c` drops its edge to `b` the
//! moment the branch flips to `c`, so writes to `b` no longer re-run it.
//!
//! # Lifecycle
//!
//! The runtime registers effects weakly. The [`Effect`] handle returned at
//! registration owns the closure; clones share it, and dropping the last
//! handle disposes the effect — it simply stops being found at trigger
//! time. Computed values and watchers hold their own effect handles
//! internally for exactly this reason.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;

use super::runtime::Runtime;
use super::store::{Key, Token};
use super::value::Value;

/// Unique identifier for an effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EffectId(u64);

impl EffectId {
    /// Generate a new unique effect ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for EffectId {
    fn default() -> Self {
        Self::new()
    }
}

/// A caller-supplied hook that intercepts an effect's re-execution.
///
/// When a trigger selects an effect that carries a scheduler, the scheduler
/// is called with the effect instead of running it; whether and when the
/// effect actually runs is then the scheduler's decision. This is the sole
/// deferral point in the engine — see `Runtime::queue_scheduler` for the
/// batched reference implementation.
pub type Scheduler = Arc<dyn Fn(&Effect) + Send + Sync>;

/// Options accepted at effect registration.
#[derive(Clone, Default)]
pub struct EffectOptions {
    /// Skip the initial run at registration. Lazy effects run only when
    /// `Effect::run` is called or a dependency change dispatches them.
    pub lazy: bool,
    /// Re-execution hook. `None` means run synchronously at trigger time.
    pub scheduler: Option<Scheduler>,
}

pub(crate) struct EffectInner {
    pub(crate) id: EffectId,
    pub(crate) body: Box<dyn Fn() -> Value + Send + Sync>,
    /// Reverse edges recorded by the most recent run, consumed by cleanup.
    pub(crate) edges: Mutex<SmallVec<[(Token, Key); 8]>>,
    pub(crate) scheduler: Option<Scheduler>,
}

impl EffectInner {
    pub(crate) fn new(
        body: Box<dyn Fn() -> Value + Send + Sync>,
        scheduler: Option<Scheduler>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: EffectId::new(),
            body,
            edges: Mutex::new(SmallVec::new()),
            scheduler,
        })
    }
}

/// Handle to a registered effect. Clones share state.
#[derive(Clone)]
pub struct Effect {
    rt: Runtime,
    inner: Arc<EffectInner>,
}

impl Effect {
    pub(crate) fn from_parts(rt: Runtime, inner: Arc<EffectInner>) -> Self {
        Self { rt, inner }
    }

    pub fn id(&self) -> EffectId {
        self.inner.id
    }

    /// Force a synchronous re-run and return the closure's result.
    ///
    /// Runs through the full runner sequence: cleanup, stack push, invoke,
    /// stack pop.
    pub fn run(&self) -> Value {
        self.rt.run_effect(&self.inner)
    }

    /// Number of dependency edges recorded by the most recent run.
    pub fn dependency_count(&self) -> usize {
        self.inner.edges.lock().len()
    }

    pub(crate) fn inner(&self) -> &Arc<EffectInner> {
        &self.inner
    }
}

impl PartialEq for Effect {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Effect {}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id)
            .field("dependency_count", &self.dependency_count())
            .field("has_scheduler", &self.inner.scheduler.is_some())
            .finish()
    }
}
