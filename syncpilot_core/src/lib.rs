//! syncpilot core library
//!
//! Orchestrates replication jobs across a fixed set of backend instances:
//! a per-instance state machine, operator operations (start, stop, commit,
//! reverse, query) and a background monitor that auto-commits once the
//! destination has caught up.

pub mod config;
pub mod control;
pub mod controller;
pub mod error;
pub mod monitor;
pub mod phase;
pub mod progress;
pub mod registry;

// Re-export main types
pub use config::{InstanceConfig, OrchestratorConfig, StartSettings};
pub use control::{ControlApi, ControlResult, HttpClientConfig, HttpControlClient, StartRequest};
pub use controller::{ControllerConfig, ReconcileReport, RefreshOutcome, SyncController};
pub use error::{ControlError, Error, Result, TransitionError, ValidationError};
pub use monitor::{MonitorExit, MonitorHandle};
pub use phase::{Operation, Phase};
pub use progress::{CommitPolicy, CommitReadiness, Progress};
pub use registry::{InstanceId, InstanceRecord, InstanceRegistry, InstanceSnapshot};
