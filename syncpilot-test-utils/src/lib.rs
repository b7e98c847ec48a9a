//! Test utilities for syncpilot
//!
//! This crate provides a scriptable control API mock, progress builders, and
//! controller fixtures for testing the orchestrator.

pub mod builders;
pub mod fixtures;
pub mod mocks;

// Re-export commonly used types
pub use builders::ProgressBuilder;
pub use fixtures::{TEST_POLL_INTERVAL, TestHarness};
pub use mocks::{MockCall, MockControlApi, MockOutcome, ProgressReply};
