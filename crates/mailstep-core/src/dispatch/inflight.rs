//! Per-execution single-flight map.
//!
//! Each execution id maps to either a running send (a shared future every
//! caller can await) or its completed outcome. Completed outcomes are kept
//! for `retention` so orchestrator retries get the original result instead
//! of a second send.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_util::FutureExt;
use futures_util::future::{self, BoxFuture, Shared};

use mailstep_types::execution::{ExecutionId, ExecutionOutcome};

pub type OutcomeFlight = Shared<BoxFuture<'static, ExecutionOutcome>>;

enum Slot {
    InFlight(OutcomeFlight),
    Done {
        outcome: ExecutionOutcome,
        finished_at: Instant,
    },
}

#[derive(Clone)]
pub struct InflightMap {
    slots: Arc<DashMap<ExecutionId, Slot>>,
    retention: Duration,
}

impl InflightMap {
    pub fn new(retention: Duration) -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
            retention,
        }
    }

    /// Join the flight for `id`, or spawn `start()` as the single flight if
    /// none exists.
    ///
    /// The work runs in its own task and records its outcome when done, so
    /// it completes even if every caller stops waiting.
    pub fn join_or_start<F, Fut>(&self, id: &ExecutionId, start: F) -> OutcomeFlight
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ExecutionOutcome> + Send + 'static,
    {
        match self.slots.entry(id.clone()) {
            Entry::Occupied(entry) => rejoin(id, entry.get()),
            Entry::Vacant(entry) => {
                let work = start();
                let slots = Arc::clone(&self.slots);
                let key = id.clone();
                // The task's write-back waits on this shard until the
                // InFlight slot below is in place.
                let handle = tokio::spawn(async move {
                    let outcome = work.await;
                    slots.insert(
                        key,
                        Slot::Done {
                            outcome: outcome.clone(),
                            finished_at: Instant::now(),
                        },
                    );
                    outcome
                });

                let slots = Arc::clone(&self.slots);
                let key = id.clone();
                let flight = async move {
                    match handle.await {
                        Ok(outcome) => outcome,
                        Err(err) => {
                            tracing::error!(execution_id = %key, error = %err, "execution task aborted");
                            slots.remove_if(&key, |_, slot| matches!(slot, Slot::InFlight(_)));
                            ExecutionOutcome::failed(key, 0, "internal_error", "execution task aborted")
                        }
                    }
                }
                .boxed()
                .shared();

                entry.insert(Slot::InFlight(flight.clone()));
                flight
            }
        }
    }

    /// The existing flight for `id` (running, or a replay of its retained
    /// outcome) without starting one.
    pub fn join(&self, id: &ExecutionId) -> Option<OutcomeFlight> {
        self.slots.get(id).map(|slot| rejoin(id, slot.value()))
    }

    /// Completed outcome for `id`, if still retained.
    pub fn completed(&self, id: &ExecutionId) -> Option<ExecutionOutcome> {
        self.slots.get(id).and_then(|slot| match slot.value() {
            Slot::Done { outcome, .. } => Some(outcome.clone()),
            Slot::InFlight(_) => None,
        })
    }

    /// Drop completed outcomes older than the retention window.
    pub fn prune(&self, now: Instant) {
        let retention = self.retention;
        self.slots.retain(|_, slot| match slot {
            Slot::InFlight(_) => true,
            Slot::Done { finished_at, .. } => now.saturating_duration_since(*finished_at) < retention,
        });
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

fn rejoin(id: &ExecutionId, slot: &Slot) -> OutcomeFlight {
    match slot {
        Slot::InFlight(flight) => {
            tracing::debug!(execution_id = %id, "joining in-flight execution");
            flight.clone()
        }
        Slot::Done { outcome, .. } => {
            tracing::debug!(execution_id = %id, outcome = %outcome.status, "replaying completed execution");
            future::ready(outcome.clone()).boxed().shared()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn id(s: &str) -> ExecutionId {
        ExecutionId::new(s)
    }

    #[tokio::test]
    async fn test_concurrent_joins_share_one_flight() {
        let map = InflightMap::new(Duration::from_secs(60));
        let runs = Arc::new(AtomicUsize::new(0));

        let mut flights = Vec::new();
        for _ in 0..5 {
            let runs = Arc::clone(&runs);
            flights.push(map.join_or_start(&id("ex-1"), move || async move {
                runs.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                ExecutionOutcome::sent(ExecutionId::new("ex-1"), 1, Some("d-1".into()))
            }));
        }

        let outcomes = futures_util::future::join_all(flights).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(outcomes.iter().all(|o| o == &outcomes[0]));
        assert!(outcomes[0].is_sent());
    }

    #[tokio::test]
    async fn test_completed_outcome_is_replayed() {
        let map = InflightMap::new(Duration::from_secs(60));
        let runs = Arc::new(AtomicUsize::new(0));
        let start = |runs: Arc<AtomicUsize>| {
            move || async move {
                runs.fetch_add(1, Ordering::SeqCst);
                ExecutionOutcome::failed(ExecutionId::new("ex-1"), 1, "client_error", "HTTP 422")
            }
        };

        let first = map.join_or_start(&id("ex-1"), start(Arc::clone(&runs))).await;
        assert_eq!(map.completed(&id("ex-1")), Some(first.clone()));

        let replayed = map.join_or_start(&id("ex-1"), start(Arc::clone(&runs))).await;
        assert_eq!(replayed, first);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_join_never_starts_work() {
        let map = InflightMap::new(Duration::from_secs(60));
        assert!(map.join(&id("ex-1")).is_none());
        assert!(map.is_empty());

        let running = map.join_or_start(&id("ex-1"), || async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            ExecutionOutcome::sent(ExecutionId::new("ex-1"), 1, Some("d-1".into()))
        });
        let joined = map.join(&id("ex-1")).unwrap();
        let (running, joined) = tokio::join!(running, joined);
        assert_eq!(running, joined);

        let replayed = map.join(&id("ex-1")).unwrap().await;
        assert_eq!(replayed, running);
    }

    #[tokio::test]
    async fn test_work_finishes_without_waiters() {
        let map = InflightMap::new(Duration::from_secs(60));
        let flight = map.join_or_start(&id("ex-1"), || async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            ExecutionOutcome::sent(ExecutionId::new("ex-1"), 1, None)
        });
        drop(flight);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(map.completed(&id("ex-1")).is_some_and(|o| o.is_sent()));
    }

    #[tokio::test]
    async fn test_prune_evicts_only_expired_outcomes() {
        let map = InflightMap::new(Duration::from_millis(50));
        map.join_or_start(&id("done"), || async {
            ExecutionOutcome::sent(ExecutionId::new("done"), 1, None)
        })
        .await;
        let _running = map.join_or_start(&id("running"), || async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            ExecutionOutcome::sent(ExecutionId::new("running"), 1, None)
        });
        tokio::task::yield_now().await;

        map.prune(Instant::now());
        assert_eq!(map.len(), 2);

        map.prune(Instant::now() + Duration::from_millis(100));
        assert_eq!(map.len(), 1);
        assert!(map.completed(&id("done")).is_none());
    }

    #[tokio::test]
    async fn test_distinct_ids_run_independently() {
        let map = InflightMap::new(Duration::from_secs(60));
        let a = map.join_or_start(&id("a"), || async {
            ExecutionOutcome::failed(ExecutionId::new("a"), 1, "server_error", "HTTP 500")
        });
        let b = map.join_or_start(&id("b"), || async {
            ExecutionOutcome::sent(ExecutionId::new("b"), 1, None)
        });

        let (a, b) = tokio::join!(a, b);
        assert!(!a.is_sent());
        assert!(b.is_sent());
    }
}
