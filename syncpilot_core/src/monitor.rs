//! Background progress monitor
//!
//! One task per running instance. Each iteration checks that the instance is
//! still running and still owned by this task, polls progress, records it and
//! decides whether to commit. The task ends after the first commit attempt,
//! when the phase leaves `Running`, or when it is told to stop.

use crate::controller::SyncController;
use crate::phase::Phase;
use crate::registry::InstanceId;
use chrono::Utc;
use log::{debug, error, info, warn};
use std::fmt;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Handle to a spawned monitor task
#[derive(Debug)]
pub struct MonitorHandle {
    generation: u64,
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Sequence number distinguishing this task from earlier ones for the same instance
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Check if the task is still running and has not been told to stop
    pub fn is_active(&self) -> bool {
        !self.task.is_finished() && !*self.stop_tx.borrow()
    }

    /// Ask the task to exit at its next check
    ///
    /// An in-flight progress request is allowed to complete.
    pub fn signal_stop(&self) {
        self.stop_tx.send_replace(true);
    }

    /// Wait for the task to finish
    pub async fn join(self) {
        if let Err(e) = self.task.await
            && e.is_panic()
        {
            error!("Monitor task (generation {}) panicked", self.generation);
        }
    }
}

/// Why a monitor loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorExit {
    /// The instance left `Running`
    PhaseChanged(Phase),
    /// Stop signal received
    Stopped,
    /// Another task took over, or the handle was withdrawn
    Superseded,
    /// Commit was attempted after the predicate held
    CommitAttempted { committed: bool },
}

impl fmt::Display for MonitorExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorExit::PhaseChanged(phase) => write!(f, "instance is {phase}"),
            MonitorExit::Stopped => write!(f, "stop requested"),
            MonitorExit::Superseded => write!(f, "superseded"),
            MonitorExit::CommitAttempted { committed: true } => write!(f, "auto-commit succeeded"),
            MonitorExit::CommitAttempted { committed: false } => write!(f, "auto-commit failed"),
        }
    }
}

/// Spawn the monitor for `id`
///
/// The caller registers the returned handle in the instance record while
/// still holding the record's lock; the task waits for that lock before its
/// first check.
pub(crate) fn spawn(controller: SyncController, id: InstanceId, generation: u64) -> MonitorHandle {
    let (stop_tx, stop_rx) = watch::channel(false);
    let task = tokio::spawn(run(controller, id, generation, stop_rx));
    MonitorHandle {
        generation,
        stop_tx,
        task,
    }
}

async fn run(
    controller: SyncController,
    id: InstanceId,
    generation: u64,
    mut stop_rx: watch::Receiver<bool>,
) {
    info!("Monitoring instance {id} (generation {generation})");
    let exit = monitor_loop(&controller, &id, generation, &mut stop_rx).await;

    let _ = controller
        .registry()
        .update(&id, |record| record.release_monitor(generation))
        .await;
    info!("Stopped monitoring instance {id}: {exit}");
}

async fn monitor_loop(
    controller: &SyncController,
    id: &InstanceId,
    generation: u64,
    stop_rx: &mut watch::Receiver<bool>,
) -> MonitorExit {
    let registry = controller.registry();
    let policy = controller.config().commit_policy;
    let poll_interval = controller.config().poll_interval;

    loop {
        if *stop_rx.borrow() {
            return MonitorExit::Stopped;
        }

        let check = registry
            .try_update(id, |record| {
                Ok((record.phase(), record.owns_monitor(generation)))
            })
            .await;
        match check {
            Ok((_, false)) | Err(_) => return MonitorExit::Superseded,
            Ok((Phase::Running, true)) => {}
            Ok((phase, true)) => return MonitorExit::PhaseChanged(phase),
        }

        match controller.control().progress(id).await {
            Ok(Some(progress)) if !progress.is_empty() => {
                let readiness = policy.evaluate(&progress);
                let still_running = registry
                    .try_update(id, |record| {
                        record.record_progress(progress, Utc::now());
                        Ok(record.phase() == Phase::Running && record.owns_monitor(generation))
                    })
                    .await
                    .unwrap_or(false);

                if !still_running {
                    continue;
                }

                if readiness.is_ready() {
                    info!("Instance {id} is {readiness}; committing");
                    let committed = match controller.commit(id).await {
                        Ok(_) => true,
                        Err(e) => {
                            warn!("Auto-commit of instance {id} failed: {e}");
                            false
                        }
                    };
                    return MonitorExit::CommitAttempted { committed };
                }
                debug!("Instance {id} not ready: {readiness}");
            }
            Ok(_) => debug!("Instance {id} returned no progress data"),
            Err(e) => warn!("Progress poll for instance {id} failed: {e}"),
        }

        tokio::select! {
            _ = tokio::time::sleep(poll_interval) => {}
            _ = stop_rx.changed() => {}
        }
    }
}
