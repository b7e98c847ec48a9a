//! Test data builders

mod progress;

pub use progress::ProgressBuilder;
