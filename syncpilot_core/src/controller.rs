//! Sync controller
//!
//! Drives the per-instance state machine. Every operator operation follows
//! the same three steps:
//! 1. validate against the current phase and reserve the instance (locked)
//! 2. call the control API (unlocked)
//! 3. release the reservation and apply the outcome (locked)
//!
//! A successful `start` spawns the instance's monitor task.

use crate::control::{ControlApi, ControlResult, StartRequest};
use crate::error::{ControlError, Error, Result};
use crate::monitor;
use crate::phase::{Operation, Phase};
use crate::progress::CommitPolicy;
use crate::registry::{InstanceId, InstanceRecord, InstanceRegistry, InstanceSnapshot};
use chrono::Utc;
use log::{debug, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// Controller settings, fixed at construction
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Delay between two progress polls of the same instance
    pub poll_interval: Duration,
    /// Auto-commit threshold
    pub commit_policy: CommitPolicy,
    /// Body sent with every `start`
    pub start_request: StartRequest,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            commit_policy: CommitPolicy::default(),
            start_request: StartRequest::default(),
        }
    }
}

/// Outcome of refreshing one instance from its control API
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// Progress recorded, phase untouched
    Updated,
    /// Progress recorded and the instance was adopted as running
    Adopted,
    /// The instance answered without a progress document
    NoData,
    /// The call failed; the record was left as it was
    Failed(ControlError),
}

/// Result of the startup reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Instances found running and now monitored
    pub adopted: Vec<InstanceId>,
    /// Instances that answered but are not running
    pub unchanged: Vec<InstanceId>,
    /// Instances whose control API could not be read
    pub unreachable: Vec<InstanceId>,
}

/// State machine driver shared by the HTTP layer and the monitor tasks
#[derive(Clone)]
pub struct SyncController {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Arc<InstanceRegistry>,
    control: Arc<dyn ControlApi>,
    config: ControllerConfig,
    generations: AtomicU64,
    closed: AtomicBool,
}

impl SyncController {
    pub fn new(
        registry: Arc<InstanceRegistry>,
        control: Arc<dyn ControlApi>,
        config: ControllerConfig,
    ) -> Self {
        debug!(
            "Creating sync controller for {} instance(s) with config: {config:?}",
            registry.len()
        );
        Self {
            inner: Arc::new(Inner {
                registry,
                control,
                config,
                generations: AtomicU64::new(0),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn registry(&self) -> &Arc<InstanceRegistry> {
        &self.inner.registry
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    pub(crate) fn control(&self) -> &dyn ControlApi {
        self.inner.control.as_ref()
    }

    /// Check if [`shutdown`](Self::shutdown) has been called
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Start replication on an idle instance and begin monitoring it
    pub async fn start(&self, id: &InstanceId) -> Result<InstanceSnapshot> {
        self.execute(id, Operation::Start).await
    }

    /// Stop replication; the monitor exits at its next check
    pub async fn stop(&self, id: &InstanceId) -> Result<InstanceSnapshot> {
        self.execute(id, Operation::Stop).await
    }

    /// Cut a running instance over
    pub async fn commit(&self, id: &InstanceId) -> Result<InstanceSnapshot> {
        self.execute(id, Operation::Commit).await
    }

    /// Invert the replication direction
    pub async fn reverse(&self, id: &InstanceId) -> Result<InstanceSnapshot> {
        self.execute(id, Operation::Reverse).await
    }

    /// Refresh progress from the control API and return the snapshot
    ///
    /// A failed read returns the last known snapshot instead of an error.
    pub async fn query(&self, id: &InstanceId) -> Result<InstanceSnapshot> {
        let (snapshot, _) = self.refresh(id).await?;
        Ok(snapshot)
    }

    /// Last known snapshot, without calling the control API
    pub async fn snapshot(&self, id: &InstanceId) -> Result<InstanceSnapshot> {
        self.inner.registry.get(id).await
    }

    /// Last known snapshots of every instance
    pub async fn snapshots(&self) -> Vec<InstanceSnapshot> {
        self.inner.registry.snapshots().await
    }

    /// Run `operation` against `id`
    ///
    /// Mutating operations run on their own task so a caller that goes away
    /// mid-request cannot leave the instance reserved.
    pub async fn execute(&self, id: &InstanceId, operation: Operation) -> Result<InstanceSnapshot> {
        if operation == Operation::Query {
            return self.query(id).await;
        }
        if !self.inner.registry.contains(id) {
            return Err(Error::unknown_instance(id));
        }

        let this = self.clone();
        let task_id = id.clone();
        tokio::spawn(async move { this.run_operation(&task_id, operation).await })
            .await
            .map_err(|e| {
                if e.is_panic() {
                    Error::internal(format!("{operation} on instance {id} panicked"))
                } else {
                    Error::internal(format!("{operation} on instance {id} was cancelled"))
                }
            })?
    }

    async fn run_operation(&self, id: &InstanceId, operation: Operation) -> Result<InstanceSnapshot> {
        let registry = &self.inner.registry;
        let from = registry
            .try_update(id, |record| record.begin(operation))
            .await
            .inspect_err(|e| debug!("Rejected {operation} on instance {id}: {e}"))?;

        debug!("Instance {id}: calling {operation} from {from}");
        let outcome = self.call(id, operation).await;
        let succeeded = outcome.is_ok();

        let snapshot = registry
            .update(id, |record| {
                let phase = record.finish(operation, succeeded);
                if succeeded && phase == Phase::Running {
                    self.ensure_monitor(record);
                }
            })
            .await?;

        match outcome {
            Ok(()) => {
                info!(
                    "Instance {id}: {operation} succeeded ({from} -> {})",
                    snapshot.phase
                );
                Ok(snapshot)
            }
            Err(e) => {
                warn!("Instance {id}: {operation} failed, staying {from}: {e}");
                Err(e.into())
            }
        }
    }

    async fn call(&self, id: &InstanceId, operation: Operation) -> ControlResult<()> {
        let control = self.control();
        match operation {
            Operation::Start => control.start(id, &self.inner.config.start_request).await,
            Operation::Stop => control.stop(id).await,
            Operation::Commit => control.commit(id).await,
            Operation::Reverse => control.reverse(id).await,
            Operation::Query => control.progress(id).await.map(|_| ()),
        }
    }

    /// Spawn a monitor for the record unless an active one is registered
    ///
    /// Must be called with the record's lock held.
    fn ensure_monitor(&self, record: &mut InstanceRecord) {
        if record.is_monitoring() {
            return;
        }
        if self.is_closed() {
            warn!(
                "Not monitoring instance {}: controller is shutting down",
                record.id()
            );
            return;
        }

        let generation = self.inner.generations.fetch_add(1, Ordering::SeqCst) + 1;
        let handle = monitor::spawn(self.clone(), record.id().clone(), generation);
        if let Some(previous) = record.install_monitor(handle) {
            previous.signal_stop();
        }
    }

    /// Read progress and apply it to the record
    ///
    /// A `RUNNING` report adopts an `Idle` instance as `Running`, and only if
    /// no phase change and no operation happened since the read was issued.
    /// Any other phase keeps its value: leaving `Stopped`, `Committed` or
    /// `Reversed` takes an explicit `start`. An empty progress document is
    /// treated like a missing one.
    async fn refresh(&self, id: &InstanceId) -> Result<(InstanceSnapshot, RefreshOutcome)> {
        let registry = &self.inner.registry;
        let epoch = registry.try_update(id, |record| Ok(record.epoch())).await?;

        match self.control().progress(id).await {
            Ok(Some(progress)) if !progress.is_empty() => {
                let reports_running = progress.reports_running();
                let (snapshot, adopted) = registry
                    .try_update(id, |record| {
                        record.record_progress(progress, Utc::now());
                        let adopt = reports_running
                            && record.phase() == Phase::Idle
                            && record.epoch() == epoch
                            && record.pending().is_none();
                        if adopt {
                            record.set_phase(Phase::Running);
                            self.ensure_monitor(record);
                        }
                        Ok((record.snapshot(), adopt))
                    })
                    .await?;

                if adopted {
                    info!("Instance {id} reports RUNNING; adopted as running");
                    Ok((snapshot, RefreshOutcome::Adopted))
                } else {
                    Ok((snapshot, RefreshOutcome::Updated))
                }
            }
            Ok(_) => {
                debug!("Instance {id} returned no progress data");
                Ok((registry.get(id).await?, RefreshOutcome::NoData))
            }
            Err(e) => {
                warn!("Progress query for instance {id} failed: {e}");
                Ok((registry.get(id).await?, RefreshOutcome::Failed(e)))
            }
        }
    }

    /// Query every instance once and adopt the ones already replicating
    pub async fn reconcile(&self) -> ReconcileReport {
        let ids = self.inner.registry.ids().to_vec();
        let results =
            futures::future::join_all(ids.iter().map(|id| self.refresh(id))).await;

        let mut report = ReconcileReport::default();
        for (id, result) in ids.into_iter().zip(results) {
            match result {
                Ok((_, RefreshOutcome::Adopted)) => report.adopted.push(id),
                Ok((_, RefreshOutcome::Failed(_))) | Err(_) => report.unreachable.push(id),
                Ok((_, RefreshOutcome::Updated | RefreshOutcome::NoData)) => {
                    report.unchanged.push(id)
                }
            }
        }

        info!(
            "Reconciliation: {} adopted, {} unchanged, {} unreachable",
            report.adopted.len(),
            report.unchanged.len(),
            report.unreachable.len()
        );
        report
    }

    /// Stop every monitor and wait for them to exit
    ///
    /// No new monitor is spawned afterwards. Phases are left as they are.
    pub async fn shutdown(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);

        let mut handles = Vec::new();
        for id in self.inner.registry.ids() {
            if let Ok(Some(handle)) = self
                .inner
                .registry
                .try_update(id, |record| Ok(record.take_monitor()))
                .await
            {
                handle.signal_stop();
                handles.push(handle);
            }
        }

        debug!("Waiting for {} monitor(s) to exit", handles.len());
        for handle in handles {
            handle.join().await;
        }
        info!("Sync controller shut down");
    }
}
