//! Instance registry and state store
//!
//! Every configured instance owns one record behind its own mutex. The map
//! itself is built once and never changes, so looking up a record never
//! contends with work on a different instance.

use crate::error::{Error, Result, TransitionError};
use crate::monitor::MonitorHandle;
use crate::phase::{Operation, Phase};
use crate::progress::Progress;
use chrono::{DateTime, Utc};
use log::trace;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::Mutex;

/// Stable identifier of a backend instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InstanceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for InstanceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u16> for InstanceId {
    fn from(port: u16) -> Self {
        Self(port.to_string())
    }
}

/// Immutable copy of an instance record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceSnapshot {
    pub instance: InstanceId,
    pub phase: Phase,
    pub progress: Progress,
    pub last_update: Option<DateTime<Utc>>,
    /// Whether a monitor task is currently polling this instance
    pub monitoring: bool,
}

/// Mutable state of one instance
///
/// Only reachable through [`InstanceRegistry::update`] and
/// [`InstanceRegistry::try_update`], which hold the record's lock for the
/// duration of the mutation.
#[derive(Debug)]
pub struct InstanceRecord {
    id: InstanceId,
    phase: Phase,
    progress: Progress,
    last_update: Option<DateTime<Utc>>,
    monitor: Option<MonitorHandle>,
    pending: Option<Operation>,
    /// Incremented on every phase change
    epoch: u64,
}

impl InstanceRecord {
    fn new(id: InstanceId) -> Self {
        Self {
            id,
            phase: Phase::Idle,
            progress: Progress::default(),
            last_update: None,
            monitor: None,
            pending: None,
            epoch: 0,
        }
    }

    pub fn id(&self) -> &InstanceId {
        &self.id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Operation currently holding the instance, if any
    pub fn pending(&self) -> Option<Operation> {
        self.pending
    }

    /// Check if a monitor task is registered and has not been told to stop
    pub fn is_monitoring(&self) -> bool {
        self.monitor.as_ref().is_some_and(MonitorHandle::is_active)
    }

    /// Move to a new phase
    ///
    /// Leaving `Running` signals the registered monitor to stop.
    pub fn set_phase(&mut self, phase: Phase) {
        if phase == self.phase {
            return;
        }
        trace!("Instance {}: {} -> {}", self.id, self.phase, phase);
        self.phase = phase;
        self.epoch += 1;
        if !phase.is_monitored()
            && let Some(monitor) = &self.monitor
        {
            monitor.signal_stop();
        }
    }

    /// Store a successful progress read
    pub fn record_progress(&mut self, progress: Progress, at: DateTime<Utc>) {
        self.progress = progress;
        self.last_update = Some(at);
    }

    pub fn snapshot(&self) -> InstanceSnapshot {
        InstanceSnapshot {
            instance: self.id.clone(),
            phase: self.phase,
            progress: self.progress.clone(),
            last_update: self.last_update,
            monitoring: self.is_monitoring(),
        }
    }

    /// Validate `operation` against the current phase and reserve the instance
    pub(crate) fn begin(&mut self, operation: Operation) -> Result<Phase> {
        if let Some(pending) = self.pending {
            return Err(TransitionError::in_progress(self.id.as_str(), operation, pending).into());
        }
        if !operation.is_valid_from(self.phase) {
            return Err(TransitionError::invalid(self.id.as_str(), operation, self.phase).into());
        }
        if operation.is_exclusive() {
            self.pending = Some(operation);
        }
        Ok(self.phase)
    }

    /// Release the reservation taken by [`begin`](Self::begin) and apply the outcome
    pub(crate) fn finish(&mut self, operation: Operation, succeeded: bool) -> Phase {
        if self.pending == Some(operation) {
            self.pending = None;
        }
        let phase = operation.resolve(self.phase, succeeded);
        self.set_phase(phase);
        phase
    }

    pub(crate) fn owns_monitor(&self, generation: u64) -> bool {
        self.monitor
            .as_ref()
            .is_some_and(|monitor| monitor.generation() == generation && monitor.is_active())
    }

    /// Register a monitor, replacing one that was already told to stop
    pub(crate) fn install_monitor(&mut self, monitor: MonitorHandle) -> Option<MonitorHandle> {
        self.monitor.replace(monitor)
    }

    /// Forget the monitor if it is still the registered one
    pub(crate) fn release_monitor(&mut self, generation: u64) {
        if self
            .monitor
            .as_ref()
            .is_some_and(|monitor| monitor.generation() == generation)
        {
            self.monitor = None;
        }
    }

    pub(crate) fn take_monitor(&mut self) -> Option<MonitorHandle> {
        self.monitor.take()
    }
}

/// Process-wide store of instance records
#[derive(Debug)]
pub struct InstanceRegistry {
    order: Vec<InstanceId>,
    records: HashMap<InstanceId, Mutex<InstanceRecord>>,
}

impl InstanceRegistry {
    /// Create a registry with one `Idle` record per identifier
    ///
    /// Duplicate identifiers collapse into a single record.
    pub fn new(ids: impl IntoIterator<Item = InstanceId>) -> Self {
        let mut order = Vec::new();
        let mut records = HashMap::new();
        for id in ids {
            if records.contains_key(&id) {
                continue;
            }
            records.insert(id.clone(), Mutex::new(InstanceRecord::new(id.clone())));
            order.push(id);
        }
        Self { order, records }
    }

    /// Configured identifiers, in configuration order
    pub fn ids(&self) -> &[InstanceId] {
        &self.order
    }

    pub fn contains(&self, id: &InstanceId) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn record(&self, id: &InstanceId) -> Result<&Mutex<InstanceRecord>> {
        self.records.get(id).ok_or_else(|| Error::unknown_instance(id))
    }

    /// Snapshot of one instance
    pub async fn get(&self, id: &InstanceId) -> Result<InstanceSnapshot> {
        let record = self.record(id)?.lock().await;
        Ok(record.snapshot())
    }

    /// Apply `mutation` under the record's lock and return the updated snapshot
    pub async fn update<F>(&self, id: &InstanceId, mutation: F) -> Result<InstanceSnapshot>
    where
        F: FnOnce(&mut InstanceRecord),
    {
        let mut record = self.record(id)?.lock().await;
        mutation(&mut record);
        Ok(record.snapshot())
    }

    /// Apply a fallible mutation under the record's lock and return its result
    pub async fn try_update<F, T>(&self, id: &InstanceId, mutation: F) -> Result<T>
    where
        F: FnOnce(&mut InstanceRecord) -> Result<T>,
    {
        let mut record = self.record(id)?.lock().await;
        mutation(&mut record)
    }

    /// Snapshots of every instance, in configuration order
    pub async fn snapshots(&self) -> Vec<InstanceSnapshot> {
        let mut snapshots = Vec::with_capacity(self.order.len());
        for id in &self.order {
            if let Ok(snapshot) = self.get(id).await {
                snapshots.push(snapshot);
            }
        }
        snapshots
    }
}
