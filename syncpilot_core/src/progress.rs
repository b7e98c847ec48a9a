//! Progress snapshots and the auto-commit predicate

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Key carrying the replication lag in seconds
pub const LAG_KEY: &str = "lagTimeSeconds";
/// Key carrying the server-side readiness flag
pub const CAN_COMMIT_KEY: &str = "canCommit";
/// Key carrying the server-side job state
pub const STATE_KEY: &str = "state";
/// Server-side state of a job that is replicating
pub const RUNNING_STATE: &str = "RUNNING";

/// Last progress report of an instance
///
/// The control API owns the shape of this document; only a handful of keys
/// are interpreted and everything else is carried through unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Progress(Map<String, Value>);

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Replication lag, if reported as a finite non-negative number
    pub fn lag_seconds(&self) -> Option<f64> {
        self.0
            .get(LAG_KEY)
            .and_then(Value::as_f64)
            .filter(|lag| lag.is_finite() && *lag >= 0.0)
    }

    /// Readiness flag; anything but a literal `true` counts as not ready
    pub fn can_commit(&self) -> bool {
        self.0.get(CAN_COMMIT_KEY).and_then(Value::as_bool) == Some(true)
    }

    /// Server-side job state
    pub fn state(&self) -> Option<&str> {
        self.0.get(STATE_KEY).and_then(Value::as_str)
    }

    /// Check if the server reports the job as replicating
    pub fn reports_running(&self) -> bool {
        self.state() == Some(RUNNING_STATE)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for Progress {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// Auto-commit threshold
///
/// The same predicate serves every deployment profile; only the lag bound
/// differs between them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CommitPolicy {
    /// Largest lag, in seconds, at which a commit is attempted
    pub max_lag_seconds: f64,
}

impl Default for CommitPolicy {
    fn default() -> Self {
        Self::tolerant(5.0)
    }
}

impl CommitPolicy {
    /// Commit only once the destination has fully caught up
    pub fn aggressive() -> Self {
        Self {
            max_lag_seconds: 0.0,
        }
    }

    /// Commit once the lag is at most `max_lag_seconds`
    pub fn tolerant(max_lag_seconds: f64) -> Self {
        Self { max_lag_seconds }
    }

    /// Classify a progress report against this policy
    pub fn evaluate(&self, progress: &Progress) -> CommitReadiness {
        let Some(lag) = progress.lag_seconds() else {
            return CommitReadiness::LagUnknown;
        };
        if lag > self.max_lag_seconds {
            return CommitReadiness::LagTooHigh {
                lag_seconds: lag,
                max_lag_seconds: self.max_lag_seconds,
            };
        }
        if !progress.can_commit() {
            return CommitReadiness::NotCommittable;
        }
        CommitReadiness::Ready
    }

    /// `lag <= max_lag_seconds && canCommit == true`
    pub fn should_commit(&self, progress: &Progress) -> bool {
        self.evaluate(progress).is_ready()
    }
}

/// Outcome of evaluating the auto-commit predicate
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CommitReadiness {
    Ready,
    LagTooHigh {
        lag_seconds: f64,
        max_lag_seconds: f64,
    },
    NotCommittable,
    LagUnknown,
}

impl CommitReadiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, CommitReadiness::Ready)
    }
}

impl fmt::Display for CommitReadiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitReadiness::Ready => write!(f, "ready to commit"),
            CommitReadiness::LagTooHigh {
                lag_seconds,
                max_lag_seconds,
            } => write!(f, "lag {lag_seconds}s above threshold {max_lag_seconds}s"),
            CommitReadiness::NotCommittable => write!(f, "server reports canCommit=false"),
            CommitReadiness::LagUnknown => write!(f, "lag not reported"),
        }
    }
}
