//! syncpilot orchestrator daemon and command line client

pub mod client;
pub mod config;
pub mod error;
pub mod output;
pub mod server;
pub mod terminal;
