//! Builder for progress documents

use crate::mocks::ProgressReply;
use serde_json::{Map, Value, json};
use syncpilot_core::Progress;
use syncpilot_core::progress::{CAN_COMMIT_KEY, LAG_KEY, RUNNING_STATE, STATE_KEY};

/// Builder for progress documents as the control API reports them
#[derive(Debug, Clone, Default)]
pub struct ProgressBuilder {
    fields: Map<String, Value>,
}

impl ProgressBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `lagTimeSeconds`
    pub fn lag(mut self, seconds: u64) -> Self {
        self.fields.insert(LAG_KEY.to_string(), json!(seconds));
        self
    }

    /// Set `canCommit`
    pub fn can_commit(mut self, can_commit: bool) -> Self {
        self.fields.insert(CAN_COMMIT_KEY.to_string(), json!(can_commit));
        self
    }

    /// Set `state`
    pub fn state(mut self, state: &str) -> Self {
        self.fields.insert(STATE_KEY.to_string(), json!(state));
        self
    }

    /// Set `state` to `RUNNING`
    pub fn running(self) -> Self {
        self.state(RUNNING_STATE)
    }

    /// Set an arbitrary field
    pub fn field(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }

    /// Lag 0, `canCommit` true and state `RUNNING`
    pub fn caught_up() -> Self {
        Self::new().lag(0).can_commit(true).running()
    }

    pub fn build(self) -> Progress {
        Progress::from_map(self.fields)
    }

    /// Build and wrap as a scripted progress answer
    pub fn reply(self) -> ProgressReply {
        ProgressReply::Data(self.build())
    }

    /// Build the raw JSON document
    pub fn to_json(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}
