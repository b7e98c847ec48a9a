//! Mock implementations for testing

mod control;

pub use control::{MockCall, MockControlApi, MockOutcome, ProgressReply};
