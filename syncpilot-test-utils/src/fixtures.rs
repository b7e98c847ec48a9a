//! Controller fixtures wired to the mock control API

use crate::mocks::MockControlApi;
use std::sync::Arc;
use std::time::Duration;
use syncpilot_core::{
    CommitPolicy, ControllerConfig, InstanceId, InstanceRegistry, StartRequest, SyncController,
};

/// Poll interval used by [`TestHarness::new`]
pub const TEST_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// A controller over a mock control API
pub struct TestHarness {
    pub controller: SyncController,
    pub mock: Arc<MockControlApi>,
    pub ids: Vec<InstanceId>,
}

impl TestHarness {
    /// Three instances `27601`..`27603`, 5 s poll interval, tolerant(5) policy
    pub fn new() -> Self {
        Self::with_policy(CommitPolicy::default())
    }

    pub fn with_policy(commit_policy: CommitPolicy) -> Self {
        Self::with_config(ControllerConfig {
            poll_interval: TEST_POLL_INTERVAL,
            commit_policy,
            start_request: StartRequest::default(),
        })
    }

    pub fn with_config(config: ControllerConfig) -> Self {
        let ids: Vec<InstanceId> = [27601u16, 27602, 27603].map(InstanceId::from).to_vec();
        let mock = MockControlApi::shared();
        let registry = Arc::new(InstanceRegistry::new(ids.clone()));
        let controller = SyncController::new(registry, mock.clone(), config);
        Self {
            controller,
            mock,
            ids,
        }
    }

    /// First configured instance
    pub fn first(&self) -> &InstanceId {
        &self.ids[0]
    }

    pub fn poll_interval(&self) -> Duration {
        self.controller.config().poll_interval
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
