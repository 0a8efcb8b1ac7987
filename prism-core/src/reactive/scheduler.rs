//! Batched Job Queue
//!
//! The reference scheduler built on the [`Scheduler`] hook: instead of
//! running at trigger time, affected effects are enqueued as jobs, and a
//! later `flush_jobs` call drains the queue. Enqueueing is idempotent per
//! effect, so an effect triggered many times between flushes runs once with
//! the final state — the batching behavior UI frameworks rely on.
//!
//! There is no background executor; the flush point is wherever the caller
//! puts it. Jobs queued by a running job (a flushed effect re-triggering a
//! scheduled peer) are picked up by the same drain loop.
//!
//! [`Scheduler`]: super::effect::Scheduler

use indexmap::IndexMap;

use super::effect::{Effect, EffectId, Scheduler};
use super::runtime::Runtime;

/// The pending-job set, keyed by effect id for dedup, insertion-ordered.
pub(crate) struct JobQueue {
    jobs: IndexMap<EffectId, Effect>,
    flushing: bool,
}

impl JobQueue {
    pub fn new() -> Self {
        Self {
            jobs: IndexMap::new(),
            flushing: false,
        }
    }
}

impl Runtime {
    /// Enqueue an effect for the next flush. A second enqueue of the same
    /// effect before it runs is a no-op.
    pub fn queue_job(&self, effect: &Effect) {
        self.inner
            .queue
            .lock()
            .jobs
            .entry(effect.id())
            .or_insert_with(|| effect.clone());
    }

    /// Number of jobs waiting for a flush.
    pub fn pending_jobs(&self) -> usize {
        self.inner.queue.lock().jobs.len()
    }

    /// Drain the job queue, running each pending effect once in enqueue
    /// order. Jobs enqueued while draining are run in the same pass.
    /// Re-entrant calls (a flushed job calling `flush_jobs`) return
    /// immediately; the outer drain picks up whatever is queued.
    ///
    /// The in-flight flag clears on unwind too, so a panicking job does not
    /// wedge the queue: the panic propagates, and the next flush drains
    /// whatever remains.
    pub fn flush_jobs(&self) {
        {
            let mut queue = self.inner.queue.lock();
            if queue.flushing {
                return;
            }
            queue.flushing = true;
        }
        let _flush = FlushGuard { rt: self };
        loop {
            // The lock is released before the job runs; the job may enqueue.
            let next = self.inner.queue.lock().jobs.shift_remove_index(0);
            match next {
                Some((_, job)) => {
                    job.run();
                }
                None => break,
            }
        }
    }

    /// A scheduler that routes re-execution through the job queue. Attach
    /// it via `EffectOptions::scheduler` to batch an effect's re-runs.
    pub fn queue_scheduler(&self) -> Scheduler {
        let rt = self.clone();
        std::sync::Arc::new(move |effect: &Effect| rt.queue_job(effect))
    }
}

/// Clears the in-flight flag on drop, including during unwind.
struct FlushGuard<'a> {
    rt: &'a Runtime,
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.rt.inner.queue.lock().flushing = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::effect::EffectOptions;
    use crate::reactive::value::{Obj, Value};
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    #[test]
    fn queued_effect_runs_once_per_flush() {
        let rt = Runtime::new();
        let handle = rt.reactive(Obj::map().with("n", 0));

        let run_count = Arc::new(AtomicI32::new(0));
        let run_count_clone = run_count.clone();
        let handle_clone = handle.clone();
        let _effect = rt.effect_with(
            move || {
                handle_clone.get("n");
                run_count_clone.fetch_add(1, Ordering::SeqCst);
                Value::Null
            },
            EffectOptions {
                lazy: false,
                scheduler: Some(rt.queue_scheduler()),
            },
        );
        assert_eq!(run_count.load(Ordering::SeqCst), 1);

        // Three writes, one batched re-run.
        handle.set("n", 1).unwrap();
        handle.set("n", 2).unwrap();
        handle.set("n", 3).unwrap();
        assert_eq!(run_count.load(Ordering::SeqCst), 1);
        assert_eq!(rt.pending_jobs(), 1);

        rt.flush_jobs();
        assert_eq!(run_count.load(Ordering::SeqCst), 2);
        assert_eq!(rt.pending_jobs(), 0);
    }

    #[test]
    fn flush_with_empty_queue_is_a_noop() {
        let rt = Runtime::new();
        rt.flush_jobs();
        assert_eq!(rt.pending_jobs(), 0);
    }

    #[test]
    fn flush_recovers_after_a_panicking_job() {
        let rt = Runtime::new();
        let handle = rt.reactive(Obj::map().with("n", 0));

        let run_count = Arc::new(AtomicI32::new(0));
        let run_count_clone = run_count.clone();
        let handle_clone = handle.clone();
        let _effect = rt.effect_with(
            move || {
                let n = handle_clone.get("n");
                run_count_clone.fetch_add(1, Ordering::SeqCst);
                if n == Value::Int(1) {
                    panic!("job failure");
                }
                Value::Null
            },
            EffectOptions {
                lazy: false,
                scheduler: Some(rt.queue_scheduler()),
            },
        );
        assert_eq!(run_count.load(Ordering::SeqCst), 1);

        handle.set("n", 1).unwrap();
        let rt_clone = rt.clone();
        let result =
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| rt_clone.flush_jobs()));
        assert!(result.is_err());
        assert_eq!(run_count.load(Ordering::SeqCst), 2);

        // The in-flight flag unwound cleanly; a later flush still drains.
        handle.set("n", 2).unwrap();
        assert_eq!(rt.pending_jobs(), 1);
        rt.flush_jobs();
        assert_eq!(run_count.load(Ordering::SeqCst), 3);
        assert_eq!(rt.pending_jobs(), 0);
    }

    #[test]
    fn jobs_run_in_enqueue_order() {
        let rt = Runtime::new();
        let handle = rt.reactive(Obj::map().with("n", 0));

        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let mut effects = Vec::new();
        for tag in ["a", "b", "c"] {
            let handle_clone = handle.clone();
            let order_clone = order.clone();
            effects.push(rt.effect_with(
                move || {
                    handle_clone.get("n");
                    order_clone.lock().push(tag);
                    Value::Null
                },
                EffectOptions {
                    lazy: false,
                    scheduler: Some(rt.queue_scheduler()),
                },
            ));
        }
        order.lock().clear();

        handle.set("n", 1).unwrap();
        rt.flush_jobs();
        assert_eq!(*order.lock(), vec!["a", "b", "c"]);
    }
}
