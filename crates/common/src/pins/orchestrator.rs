//! Background pin/unpin execution
//!
//! Accepted pins are handed to a lightweight job queue (flume) so the
//! request path never waits on the pinning backend. A single worker
//! drains the queue and spawns one task per job; it also periodically
//! fails pins that have been stuck in `pinning` for too long.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use time::OffsetDateTime;
use tokio::time::timeout;
use uuid::Uuid;

use super::store::{PinStore, PinStoreError};
use super::PinStatus;
use crate::access::Owner;
use crate::backend::PinningBackend;
use crate::quota::QuotaLedger;

pub const DEFAULT_PIN_TIMEOUT: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_REAP_INTERVAL: Duration = Duration::from_secs(60);

/// Background jobs that can be dispatched to the pin worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinJob {
    /// Drive a queued pin through the backend
    Pin {
        pin_id: Uuid,
        cid: String,
        /// Charged for the pinned size
        owner: Owner,
    },
    /// Release content whose pin record has been deleted
    Unpin { cid: String },
}

#[derive(Debug, thiserror::Error)]
#[error("pin worker has shut down")]
pub struct DispatchError;

/// Job dispatcher that can be cloned and shared across tasks
#[derive(Debug, Clone)]
pub struct JobDispatcher {
    tx: flume::Sender<PinJob>,
}

impl JobDispatcher {
    /// Create a new dispatcher and the receiver to hand to [`run_worker`]
    pub fn new() -> (Self, JobReceiver) {
        let (tx, rx) = flume::unbounded();
        (Self { tx }, JobReceiver { rx })
    }

    /// Non-blocking; fails only once the receiver has been dropped
    pub fn dispatch(&self, job: PinJob) -> Result<(), DispatchError> {
        tracing::debug!(?job, "dispatching pin job");
        self.tx.send(job).map_err(|_| DispatchError)
    }

    pub fn dispatch_pin(&self, pin_id: Uuid, cid: String, owner: Owner) -> Result<(), DispatchError> {
        self.dispatch(PinJob::Pin { pin_id, cid, owner })
    }

    pub fn dispatch_unpin(&self, cid: String) -> Result<(), DispatchError> {
        self.dispatch(PinJob::Unpin { cid })
    }
}

#[derive(Debug)]
pub struct JobReceiver {
    rx: flume::Receiver<PinJob>,
}

impl JobReceiver {
    pub fn into_async(self) -> flume::r#async::RecvStream<'static, PinJob> {
        self.rx.into_stream()
    }

    /// Take every job currently queued without waiting
    pub fn drain(&self) -> Vec<PinJob> {
        self.rx.try_iter().collect()
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Upper bound on a single backend pin call
    pub pin_timeout: Duration,
    /// How often the worker looks for stalled pins
    pub reap_interval: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            pin_timeout: DEFAULT_PIN_TIMEOUT,
            reap_interval: DEFAULT_REAP_INTERVAL,
        }
    }
}

impl OrchestratorConfig {
    /// A pin left in `pinning` longer than this is considered stalled
    pub fn stall_threshold(&self) -> Duration {
        self.pin_timeout + self.reap_interval
    }
}

/// How a pin job ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinOutcome {
    Pinned { size_bytes: u64 },
    Failed,
    /// The job did not apply: the pin was gone, already claimed by
    ///  another job, or its status could not be updated
    Skipped,
}

/// Executes pin jobs against a store, a ledger and a backend
#[derive(Debug, Clone)]
pub struct Orchestrator<S, Q> {
    store: S,
    ledger: Q,
    backend: Arc<dyn PinningBackend>,
    config: OrchestratorConfig,
}

impl<S: PinStore, Q: QuotaLedger> Orchestrator<S, Q> {
    pub fn new(
        store: S,
        ledger: Q,
        backend: Arc<dyn PinningBackend>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            store,
            ledger,
            backend,
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub async fn execute(&self, job: PinJob) {
        match job {
            PinJob::Pin { pin_id, cid, owner } => {
                self.pin(pin_id, &cid, &owner).await;
            }
            PinJob::Unpin { cid } => {
                self.unpin(&cid).await;
            }
        }
    }

    /// Drive a single pin from `queued` to `pinned` or `failed`.
    ///
    /// Nothing here is retried: a failed backend call leaves the pin
    ///  `failed` and the client has to delete and re-create it.
    #[tracing::instrument(skip(self, owner), fields(owner_id = %owner.id))]
    pub async fn pin(&self, pin_id: Uuid, cid: &str, owner: &Owner) -> PinOutcome {
        match self.store.update_status(pin_id, PinStatus::Pinning).await {
            Ok(()) => {}
            Err(PinStoreError::InvalidTransition { from, .. }) => {
                tracing::debug!(%from, "pin already picked up, skipping");
                return PinOutcome::Skipped;
            }
            Err(PinStoreError::NotFound) => {
                tracing::debug!("pin deleted before it was started");
                return PinOutcome::Skipped;
            }
            Err(e) => {
                // left queued; picked up again when the worker restarts
                tracing::error!(error = %e, "failed to mark pin as pinning");
                return PinOutcome::Skipped;
            }
        }

        let result = match timeout(self.config.pin_timeout, self.backend.pin(cid)).await {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(_) => Err(format!(
                "timed out after {}s",
                self.config.pin_timeout.as_secs()
            )),
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, "backend failed to pin content");
            self.mark_failed(pin_id).await;
            return PinOutcome::Failed;
        }

        let size_bytes = match self.backend.object_stat(cid).await {
            Ok(size) => size,
            Err(e) => {
                tracing::warn!(error = %e, "failed to stat pinned content, recording size 0");
                0
            }
        };

        // Charged before the pin turns `pinned`, so a delete that sees the
        //  size always finds the charge already applied.
        let delta = i64::try_from(size_bytes).unwrap_or(i64::MAX);
        let charged = delta > 0 && self.charge(owner, delta).await;

        let marked = self
            .store
            .update_status_and_size(pin_id, PinStatus::Pinned, size_bytes)
            .await;
        if let Err(e) = marked {
            if charged {
                self.charge(owner, -delta).await;
            }
            match e {
                PinStoreError::NotFound => {
                    // deleted while we were pinning; don't leave the content behind
                    tracing::info!("pin deleted while pinning, releasing content");
                    self.unpin(cid).await;
                }
                e => tracing::error!(error = %e, "failed to mark pin as pinned"),
            }
            return PinOutcome::Skipped;
        }

        tracing::info!(size_bytes, "content pinned");
        PinOutcome::Pinned { size_bytes }
    }

    async fn charge(&self, owner: &Owner, delta: i64) -> bool {
        match self.ledger.adjust_usage(owner, delta).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(error = %e, delta, "failed to adjust quota usage");
                false
            }
        }
    }

    async fn mark_failed(&self, pin_id: Uuid) {
        if let Err(e) = self.store.update_status(pin_id, PinStatus::Failed).await {
            tracing::error!(%pin_id, error = %e, "failed to mark pin as failed");
        }
    }

    /// Release content from the backend. Failures are logged and swallowed.
    #[tracing::instrument(skip(self))]
    pub async fn unpin(&self, cid: &str) -> bool {
        match self.backend.unpin(cid).await {
            Ok(()) => {
                tracing::info!("content unpinned");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "backend failed to unpin content");
                false
            }
        }
    }

    /// Fail every pin that has sat in `pinning` past the stall threshold.
    ///
    /// Returns how many pins were moved to `failed`.
    pub async fn reap_stalled(&self) -> usize {
        let cutoff = OffsetDateTime::now_utc() - self.config.stall_threshold();
        let stalled = match self.store.list_by_status(PinStatus::Pinning, cutoff).await {
            Ok(stalled) => stalled,
            Err(e) => {
                tracing::error!(error = %e, "failed to list stalled pins");
                return 0;
            }
        };

        let mut reaped = 0;
        for pin in stalled {
            match self.store.update_status(pin.id, PinStatus::Failed).await {
                Ok(()) => {
                    tracing::warn!(pin_id = %pin.id, cid = %pin.cid, "pin stalled, marked failed");
                    reaped += 1;
                }
                // finished or deleted since we listed it
                Err(PinStoreError::InvalidTransition { .. }) | Err(PinStoreError::NotFound) => {}
                Err(e) => {
                    tracing::error!(pin_id = %pin.id, error = %e, "failed to reap stalled pin");
                }
            }
        }
        reaped
    }

    /// Pin jobs for every pin still `queued` as of `before`, i.e. accepted
    ///  by a previous run that never got to them
    pub async fn queued_jobs(&self, before: OffsetDateTime) -> Vec<PinJob> {
        match self.store.list_by_status(PinStatus::Queued, before).await {
            Ok(pins) => pins
                .into_iter()
                .map(|pin| PinJob::Pin {
                    pin_id: pin.id,
                    cid: pin.cid,
                    owner: pin.owner,
                })
                .collect(),
            Err(e) => {
                tracing::error!(error = %e, "failed to list queued pins");
                Vec::new()
            }
        }
    }
}

/// Run the pin worker until every [`JobDispatcher`] has been dropped.
///
/// Each job runs in its own task. Pins left `queued` by a previous run
///  are resumed at startup.
pub async fn run_worker<S, Q>(orchestrator: Orchestrator<S, Q>, receiver: JobReceiver)
where
    S: PinStore,
    Q: QuotaLedger,
{
    let started_at = OffsetDateTime::now_utc();
    let mut jobs = receiver.into_async();
    let mut reap_interval = tokio::time::interval(orchestrator.config.reap_interval);
    reap_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let resumed = orchestrator.queued_jobs(started_at).await;
    if !resumed.is_empty() {
        tracing::info!(count = resumed.len(), "resuming queued pins");
    }
    for job in resumed {
        spawn_job(&orchestrator, job);
    }

    tracing::info!("pin worker started");
    loop {
        tokio::select! {
            job = jobs.next() => match job {
                Some(job) => spawn_job(&orchestrator, job),
                None => {
                    tracing::info!("job queue closed, stopping pin worker");
                    break;
                }
            },
            _ = reap_interval.tick() => {
                let reaped = orchestrator.reap_stalled().await;
                if reaped > 0 {
                    tracing::info!(reaped, "reaped stalled pins");
                }
            }
        }
    }
}

fn spawn_job<S: PinStore, Q: QuotaLedger>(orchestrator: &Orchestrator<S, Q>, job: PinJob) {
    let orchestrator = orchestrator.clone();
    tokio::spawn(async move {
        orchestrator.execute(job).await;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pins::memory::{MemoryPinStore, MemoryQuotaLedger};
    use crate::quota::Usage;
    use crate::testkit::{new_pin, wait_for, wait_for_status, RecordingBackend, V0_CID, V1_CID};

    struct Harness {
        store: MemoryPinStore,
        ledger: MemoryQuotaLedger,
        orchestrator: Orchestrator<MemoryPinStore, MemoryQuotaLedger>,
        owner: Owner,
    }

    fn harness(backend: RecordingBackend, config: OrchestratorConfig) -> Harness {
        let store = MemoryPinStore::new();
        let ledger = MemoryQuotaLedger::new();
        let owner = Owner::agent("a1");
        ledger
            .set_usage(&owner, Usage::new(0, 1024 * 1024))
            .unwrap();
        let orchestrator =
            Orchestrator::new(store.clone(), ledger.clone(), Arc::new(backend), config);
        Harness {
            store,
            ledger,
            orchestrator,
            owner,
        }
    }

    #[tokio::test]
    async fn test_pin_success_records_size_and_charges_quota() {
        let backend = RecordingBackend::new().with_size(V1_CID, 1024);
        let h = harness(backend.clone(), OrchestratorConfig::default());
        let pin = h.store.create(new_pin(V1_CID, &h.owner)).await.unwrap();

        let outcome = h.orchestrator.pin(pin.id, V1_CID, &h.owner).await;
        assert_eq!(outcome, PinOutcome::Pinned { size_bytes: 1024 });

        let pin = h.store.get_by_id(pin.id).await.unwrap();
        assert_eq!(pin.status, PinStatus::Pinned);
        assert_eq!(pin.size_bytes, Some(1024));
        assert_eq!(h.ledger.usage(&h.owner).await.unwrap().used_bytes, 1024);
        assert_eq!(backend.pinned(), vec![V1_CID.to_string()]);
    }

    #[tokio::test]
    async fn test_backend_failure_marks_failed_without_charging() {
        let backend = RecordingBackend::new().failing_pins().with_default_size(10);
        let h = harness(backend, OrchestratorConfig::default());
        let pin = h.store.create(new_pin(V1_CID, &h.owner)).await.unwrap();

        let outcome = h.orchestrator.pin(pin.id, V1_CID, &h.owner).await;
        assert_eq!(outcome, PinOutcome::Failed);
        assert_eq!(
            h.store.get_by_id(pin.id).await.unwrap().status,
            PinStatus::Failed
        );
        assert_eq!(h.ledger.usage(&h.owner).await.unwrap().used_bytes, 0);
    }

    #[tokio::test]
    async fn test_stat_failure_pins_with_zero_size() {
        let backend = RecordingBackend::new().failing_stats();
        let h = harness(backend, OrchestratorConfig::default());
        let pin = h.store.create(new_pin(V1_CID, &h.owner)).await.unwrap();

        let outcome = h.orchestrator.pin(pin.id, V1_CID, &h.owner).await;
        assert_eq!(outcome, PinOutcome::Pinned { size_bytes: 0 });
        assert_eq!(
            h.store.get_by_id(pin.id).await.unwrap().size_bytes,
            Some(0)
        );
        assert_eq!(h.ledger.usage(&h.owner).await.unwrap().used_bytes, 0);
    }

    #[tokio::test]
    async fn test_pin_timeout_marks_failed() {
        let backend = RecordingBackend::new().with_pin_delay(Duration::from_secs(5));
        let config = OrchestratorConfig {
            pin_timeout: Duration::from_millis(20),
            ..Default::default()
        };
        let h = harness(backend, config);
        let pin = h.store.create(new_pin(V1_CID, &h.owner)).await.unwrap();

        assert_eq!(
            h.orchestrator.pin(pin.id, V1_CID, &h.owner).await,
            PinOutcome::Failed
        );
    }

    async fn pin_in_background(h: &Harness, pin_id: Uuid) -> tokio::task::JoinHandle<PinOutcome> {
        let orchestrator = h.orchestrator.clone();
        let owner = h.owner.clone();
        let task = tokio::spawn(async move { orchestrator.pin(pin_id, V1_CID, &owner).await });
        wait_for_status(&h.store, pin_id, PinStatus::Pinning)
            .await
            .expect("pin never reached pinning");
        task
    }

    #[tokio::test]
    async fn test_pin_deleted_while_pinning_leaves_no_usage() {
        let backend = RecordingBackend::new()
            .with_size(V1_CID, 4096)
            .with_pin_delay(Duration::from_millis(200));
        let h = harness(backend.clone(), OrchestratorConfig::default());
        let pin = h.store.create(new_pin(V1_CID, &h.owner)).await.unwrap();

        let task = pin_in_background(&h, pin.id).await;
        h.store.delete(pin.id).await.unwrap();

        assert_eq!(task.await.unwrap(), PinOutcome::Skipped);
        assert_eq!(h.ledger.usage(&h.owner).await.unwrap().used_bytes, 0);
        assert_eq!(backend.unpinned(), vec![V1_CID.to_string()]);
    }

    #[tokio::test]
    async fn test_pin_reaped_while_pinning_is_refunded() {
        let backend = RecordingBackend::new()
            .with_size(V1_CID, 4096)
            .with_pin_delay(Duration::from_millis(200));
        let h = harness(backend, OrchestratorConfig::default());
        let pin = h.store.create(new_pin(V1_CID, &h.owner)).await.unwrap();

        let task = pin_in_background(&h, pin.id).await;
        h.store.update_status(pin.id, PinStatus::Failed).await.unwrap();

        assert_eq!(task.await.unwrap(), PinOutcome::Skipped);
        assert_eq!(
            h.store.get_by_id(pin.id).await.unwrap().status,
            PinStatus::Failed
        );
        assert_eq!(h.ledger.usage(&h.owner).await.unwrap().used_bytes, 0);
    }

    #[tokio::test]
    async fn test_second_job_for_same_pin_is_skipped() {
        let h = harness(RecordingBackend::new(), OrchestratorConfig::default());
        let pin = h.store.create(new_pin(V1_CID, &h.owner)).await.unwrap();

        h.orchestrator.pin(pin.id, V1_CID, &h.owner).await;
        assert_eq!(
            h.orchestrator.pin(pin.id, V1_CID, &h.owner).await,
            PinOutcome::Skipped
        );
    }

    #[tokio::test]
    async fn test_reaper_fails_stalled_pins_only() {
        let config = OrchestratorConfig {
            pin_timeout: Duration::from_millis(10),
            reap_interval: Duration::from_millis(10),
        };
        let h = harness(RecordingBackend::new(), config);
        let stalled = h.store.create(new_pin(V1_CID, &h.owner)).await.unwrap();
        let queued = h.store.create(new_pin(V0_CID, &h.owner)).await.unwrap();
        h.store
            .update_status(stalled.id, PinStatus::Pinning)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.orchestrator.reap_stalled().await, 1);

        assert_eq!(
            h.store.get_by_id(stalled.id).await.unwrap().status,
            PinStatus::Failed
        );
        // queued pins are resumed, never reaped
        assert_eq!(
            h.store.get_by_id(queued.id).await.unwrap().status,
            PinStatus::Queued
        );
    }

    #[tokio::test]
    async fn test_worker_runs_dispatched_jobs() {
        let backend = RecordingBackend::new().with_size(V1_CID, 2048);
        let h = harness(backend.clone(), OrchestratorConfig::default());
        let (dispatcher, receiver) = JobDispatcher::new();
        let worker = tokio::spawn(run_worker(h.orchestrator.clone(), receiver));

        let pin = h.store.create(new_pin(V1_CID, &h.owner)).await.unwrap();
        dispatcher
            .dispatch_pin(pin.id, V1_CID.to_string(), h.owner.clone())
            .unwrap();
        let pinned = wait_for_status(&h.store, pin.id, PinStatus::Pinned)
            .await
            .expect("pin never reached pinned");
        assert_eq!(pinned.size_bytes, Some(2048));

        dispatcher.dispatch_unpin(V1_CID.to_string()).unwrap();
        let backend = &backend;
        let unpinned =
            wait_for(|| async move { (!backend.unpinned().is_empty()).then_some(()) }).await;
        assert!(unpinned.is_some());

        drop(dispatcher);
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn test_worker_resumes_queued_pins() {
        let h = harness(RecordingBackend::new(), OrchestratorConfig::default());
        let pin = h.store.create(new_pin(V1_CID, &h.owner)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let (dispatcher, receiver) = JobDispatcher::new();
        tokio::spawn(run_worker(h.orchestrator.clone(), receiver));

        assert!(wait_for_status(&h.store, pin.id, PinStatus::Pinned)
            .await
            .is_some());
        drop(dispatcher);
    }
}
