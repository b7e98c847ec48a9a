//! Instance lifecycle phases
//!
//! This module implements the state machine that governs which operations an
//! instance accepts and which phase a completed operation leads to.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Local belief about where a replication job is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Nothing started yet
    Idle,
    /// Replication in progress, monitored
    Running,
    /// Stopped by an operator
    Stopped,
    /// Cut over
    Committed,
    /// Replication direction inverted
    Reversed,
}

impl Phase {
    /// Check if the phase is a resting phase reached through an operation
    pub fn is_resting(&self) -> bool {
        matches!(self, Phase::Stopped | Phase::Committed | Phase::Reversed)
    }

    /// Check if a monitor task is expected for this phase
    pub fn is_monitored(&self) -> bool {
        matches!(self, Phase::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Running => "running",
            Phase::Stopped => "stopped",
            Phase::Committed => "committed",
            Phase::Reversed => "reversed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operations that drive the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Start,
    Stop,
    Commit,
    Reverse,
    Query,
}

impl Operation {
    /// All operator-triggered operations that change the phase
    pub const MUTATING: [Operation; 4] = [
        Operation::Start,
        Operation::Stop,
        Operation::Commit,
        Operation::Reverse,
    ];

    /// Check if the operation may be attempted from the given phase
    pub fn is_valid_from(&self, phase: Phase) -> bool {
        match self {
            Operation::Start => phase == Phase::Idle,
            Operation::Commit => phase == Phase::Running,
            Operation::Stop | Operation::Reverse | Operation::Query => true,
        }
    }

    /// Phase reached when the external call succeeds, if the operation sets one
    pub fn target_phase(&self) -> Option<Phase> {
        match self {
            Operation::Start => Some(Phase::Running),
            Operation::Stop => Some(Phase::Stopped),
            Operation::Commit => Some(Phase::Committed),
            Operation::Reverse => Some(Phase::Reversed),
            Operation::Query => None,
        }
    }

    /// Map the outcome of the external call to the phase the instance ends in
    ///
    /// A failed call never changes the phase.
    pub fn resolve(&self, from: Phase, succeeded: bool) -> Phase {
        if succeeded {
            self.target_phase().unwrap_or(from)
        } else {
            from
        }
    }

    /// Check if the operation reserves the instance while its call is in flight
    pub fn is_exclusive(&self) -> bool {
        !matches!(self, Operation::Query)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Start => "start",
            Operation::Stop => "stop",
            Operation::Commit => "commit",
            Operation::Reverse => "reverse",
            Operation::Query => "query",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
