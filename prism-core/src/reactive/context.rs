//! Active-Effect Context
//!
//! The context tracks which effect is currently running, so property reads
//! can be attributed to it. It is a stack: effects nest, and an inner
//! effect's reads must never be attributed to the outer one — when the
//! inner effect finishes, tracking resumes attributing to the outer effect,
//! not to nothing.
//!
//! Unlike a thread-local global, the stack is owned by the runtime
//! instance, so multiple independent engines can coexist in one process.
//!
//! # Guards
//!
//! Entering a frame returns a guard that pops on drop. This keeps the stack
//! correct even when a user closure panics: the unwind pops the frame
//! before the panic propagates, so the runtime is never left attributing
//! reads to a dead effect.
//!
//! The same guard pattern implements the tracking-suppression window used
//! by array mutator instrumentation: while at least one [`PauseGuard`] is
//! alive, `track` is a no-op.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::effect::EffectInner;

/// The stack of currently executing effects plus the pause counter.
pub(crate) struct ActiveStack {
    frames: RwLock<Vec<Arc<EffectInner>>>,
    paused: AtomicUsize,
}

impl ActiveStack {
    pub fn new() -> Self {
        Self {
            frames: RwLock::new(Vec::new()),
            paused: AtomicUsize::new(0),
        }
    }

    /// Push an effect frame. The frame pops when the returned guard drops.
    pub fn enter(&self, effect: Arc<EffectInner>) -> FrameGuard<'_> {
        self.frames.write().push(effect);
        FrameGuard { stack: self }
    }

    /// The effect that reads should currently be attributed to.
    pub fn current(&self) -> Option<Arc<EffectInner>> {
        self.frames.read().last().cloned()
    }

    pub fn depth(&self) -> usize {
        self.frames.read().len()
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst) > 0
    }

    /// True when reads would be recorded: some effect is running and no
    /// pause guard is alive.
    pub fn is_tracking(&self) -> bool {
        !self.is_paused() && !self.frames.read().is_empty()
    }

    /// Suppress tracking until the returned guard drops. Nests.
    pub fn pause(&self) -> PauseGuard<'_> {
        self.paused.fetch_add(1, Ordering::SeqCst);
        PauseGuard { stack: self }
    }
}

/// Pops the active-effect frame on drop.
pub(crate) struct FrameGuard<'a> {
    stack: &'a ActiveStack,
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        self.stack.frames.write().pop();
    }
}

/// Keeps tracking suppressed while alive. Obtained from
/// `Runtime::pause_tracking`.
pub struct PauseGuard<'a> {
    stack: &'a ActiveStack,
}

impl Drop for PauseGuard<'_> {
    fn drop(&mut self) {
        self.stack.paused.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::value::Value;

    fn dummy_effect() -> Arc<EffectInner> {
        EffectInner::new(Box::new(|| Value::Null), None)
    }

    #[test]
    fn stack_tracks_current_effect() {
        let stack = ActiveStack::new();
        assert!(stack.current().is_none());
        assert!(!stack.is_tracking());

        let effect = dummy_effect();
        {
            let _frame = stack.enter(effect.clone());
            assert!(stack.is_tracking());
            assert_eq!(stack.current().map(|e| e.id), Some(effect.id));
        }

        assert!(stack.current().is_none());
        assert!(!stack.is_tracking());
    }

    #[test]
    fn nested_frames_restore_outer_effect() {
        let stack = ActiveStack::new();
        let outer = dummy_effect();
        let inner = dummy_effect();

        let _outer_frame = stack.enter(outer.clone());
        {
            let _inner_frame = stack.enter(inner.clone());
            assert_eq!(stack.current().map(|e| e.id), Some(inner.id));
            assert_eq!(stack.depth(), 2);
        }

        // The outer effect is current again, not nothing.
        assert_eq!(stack.current().map(|e| e.id), Some(outer.id));
    }

    #[test]
    fn pause_guard_nests() {
        let stack = ActiveStack::new();
        let _frame = stack.enter(dummy_effect());

        assert!(stack.is_tracking());
        {
            let _p1 = stack.pause();
            {
                let _p2 = stack.pause();
                assert!(!stack.is_tracking());
            }
            assert!(!stack.is_tracking());
        }
        assert!(stack.is_tracking());
    }
}
