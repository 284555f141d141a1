//! Partitioned dispatch workers.
//!
//! Wake probes and shutdown chains block for seconds, so event handling must
//! come off the bus-delivery task.  A plain task-per-event pool would break
//! a hard ordering requirement: two events for the same identity must be
//! processed in arrival order (an exit must never overtake the entry that
//! preceded it), because the suppression window and the power action both
//! depend on it.
//!
//! The pool therefore partitions by identity: every worker owns one mpsc
//! queue, and an event is routed to `hash(identity) % workers`.  Events for
//! one identity always land on the same queue and are processed strictly in
//! order; events for different identities spread across workers and run
//! concurrently.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use gatewake_core::AccessEvent;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::application::dispatch_event::DispatchEventUseCase;

/// Queue depth per worker.  A full queue applies backpressure to the bus
/// pump rather than dropping events.
const WORKER_QUEUE_DEPTH: usize = 64;

/// The worker pool.  Dropping it closes the queues; [`DispatchPool::close`]
/// additionally waits for in-flight events to finish.
pub struct DispatchPool {
    senders: Vec<mpsc::Sender<AccessEvent>>,
    handles: Vec<JoinHandle<()>>,
}

impl DispatchPool {
    /// Spawns `workers` dispatch tasks sharing one use case.
    pub fn spawn(workers: usize, use_case: Arc<DispatchEventUseCase>) -> Self {
        let workers = workers.max(1);
        let mut senders = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);

        for worker_id in 0..workers {
            let (tx, mut rx) = mpsc::channel::<AccessEvent>(WORKER_QUEUE_DEPTH);
            let use_case = Arc::clone(&use_case);
            handles.push(tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    let outcome = use_case.dispatch(&event).await;
                    debug!(
                        worker_id,
                        event_id = %event.event_id,
                        identity = %event.identity,
                        ?outcome,
                        "event dispatched"
                    );
                }
                debug!(worker_id, "dispatch worker drained and stopped");
            }));
            senders.push(tx);
        }

        info!(workers, "dispatch worker pool started");
        Self { senders, handles }
    }

    /// Routes `event` to its identity's worker.  Returns `false` when the
    /// pool is shutting down and the event could not be enqueued.
    pub async fn submit(&self, event: AccessEvent) -> bool {
        let index = partition(&event.identity, self.senders.len());
        self.senders[index].send(event).await.is_ok()
    }

    /// Closes the queues and waits for every worker to drain.
    pub async fn close(self) {
        drop(self.senders);
        for handle in self.handles {
            // A worker that panicked already logged through the panic hook;
            // joining the rest still matters for a clean drain.
            let _ = handle.await;
        }
        info!("dispatch worker pool stopped");
    }
}

/// Maps an identity to a stable worker index.
fn partition(identity: &str, workers: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    identity.hash(&mut hasher);
    (hasher.finish() % workers as u64) as usize
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_is_stable_for_same_identity() {
        let a = partition("TAG-42", 4);
        let b = partition("TAG-42", 4);
        assert_eq!(a, b);
    }

    #[test]
    fn test_partition_is_in_range() {
        for workers in 1..8 {
            for i in 0..50 {
                let index = partition(&format!("TAG-{i}"), workers);
                assert!(index < workers);
            }
        }
    }

    #[test]
    fn test_partition_single_worker_always_zero() {
        assert_eq!(partition("anything", 1), 0);
    }

    #[test]
    fn test_partition_spreads_identities() {
        // Not a distribution-quality test — just that more than one worker
        // ever gets picked, so the pool actually parallelizes.
        let used: std::collections::HashSet<usize> =
            (0..100).map(|i| partition(&format!("TAG-{i}"), 4)).collect();
        assert!(used.len() > 1);
    }
}
