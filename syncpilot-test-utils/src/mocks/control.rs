//! Scriptable in-memory control API

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use syncpilot_core::control::{ControlApi, ControlResult, Endpoint, StartRequest};
use syncpilot_core::{ControlError, InstanceId, Progress};
use tokio::sync::{Notify, Semaphore};

/// How a command endpoint answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockOutcome {
    /// `{"success": true}`
    Success,
    /// `{"success": false}`
    Rejected,
    /// Connection refused
    Unreachable,
    /// Non-2xx answer
    HttpStatus(u16),
}

/// One scripted answer of `GET /progress`
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressReply {
    Data(Progress),
    /// Answer without a `progress` document
    Empty,
    Unreachable,
}

/// A call received by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub instance: InstanceId,
    pub endpoint: Endpoint,
}

#[derive(Debug, Default)]
struct MockState {
    outcomes: HashMap<Endpoint, MockOutcome>,
    instance_outcomes: HashMap<(InstanceId, Endpoint), MockOutcome>,
    progress: HashMap<InstanceId, VecDeque<ProgressReply>>,
    calls: Vec<MockCall>,
    start_requests: Vec<StartRequest>,
}

/// In-memory [`ControlApi`] for testing
///
/// Command endpoints succeed unless configured otherwise. Progress answers
/// are scripted per instance: each call consumes the next reply and the last
/// one repeats forever. An instance without a script answers with no data.
///
/// Calls to an endpoint can be held in flight with [`hold`](Self::hold)
/// until [`release`](Self::release) is called. Calls are recorded when they
/// arrive, so a held call is already visible in [`calls`](Self::calls).
///
/// # Examples
///
/// ```rust,no_run
/// use syncpilot_test_utils::{MockControlApi, ProgressBuilder};
/// use syncpilot_core::InstanceId;
///
/// let mock = MockControlApi::new();
/// let id = InstanceId::from("27601");
/// mock.script_progress(&id, [ProgressBuilder::new().lag(10).can_commit(true).reply()]);
/// ```
#[derive(Debug, Default)]
pub struct MockControlApi {
    state: Mutex<MockState>,
    gates: Mutex<HashMap<Endpoint, Arc<Semaphore>>>,
    arrivals: Notify,
}

impl MockControlApi {
    /// Create a mock where every command succeeds and progress is empty
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle, ready to hand to a controller
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Set how `endpoint` answers for every instance
    pub fn set_outcome(&self, endpoint: Endpoint, outcome: MockOutcome) {
        self.state.lock().unwrap().outcomes.insert(endpoint, outcome);
    }

    /// Set how `endpoint` answers for one instance
    pub fn set_instance_outcome(&self, id: &InstanceId, endpoint: Endpoint, outcome: MockOutcome) {
        self.state
            .lock()
            .unwrap()
            .instance_outcomes
            .insert((id.clone(), endpoint), outcome);
    }

    /// Append replies to the progress script of `id`
    pub fn script_progress(&self, id: &InstanceId, replies: impl IntoIterator<Item = ProgressReply>) {
        self.state
            .lock()
            .unwrap()
            .progress
            .entry(id.clone())
            .or_default()
            .extend(replies);
    }

    /// Replace the progress script of `id`
    pub fn set_progress(&self, id: &InstanceId, reply: ProgressReply) {
        self.state
            .lock()
            .unwrap()
            .progress
            .insert(id.clone(), VecDeque::from([reply]));
    }

    /// Keep calls to `endpoint` in flight until released
    pub fn hold(&self, endpoint: Endpoint) {
        self.gates
            .lock()
            .unwrap()
            .insert(endpoint, Arc::new(Semaphore::new(0)));
    }

    /// Let held and future calls to `endpoint` complete
    pub fn release(&self, endpoint: Endpoint) {
        if let Some(gate) = self.gates.lock().unwrap().remove(&endpoint) {
            gate.close();
        }
    }

    /// Every call received so far, in arrival order
    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Number of calls to `endpoint` across all instances
    pub fn calls_to(&self, endpoint: Endpoint) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|call| call.endpoint == endpoint)
            .count()
    }

    /// Number of calls to `endpoint` on `id`
    pub fn calls_for(&self, id: &InstanceId, endpoint: Endpoint) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|call| call.endpoint == endpoint && &call.instance == id)
            .count()
    }

    /// Total number of calls received
    pub fn total_calls(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    /// Bodies received by `start`, in arrival order
    pub fn start_requests(&self) -> Vec<StartRequest> {
        self.state.lock().unwrap().start_requests.clone()
    }

    /// Wait until `endpoint` has received at least `count` calls
    pub async fn wait_for_calls(&self, endpoint: Endpoint, count: usize) {
        loop {
            let arrived = self.arrivals.notified();
            if self.calls_to(endpoint) >= count {
                return;
            }
            arrived.await;
        }
    }

    async fn enter(&self, id: &InstanceId, endpoint: Endpoint) {
        self.state.lock().unwrap().calls.push(MockCall {
            instance: id.clone(),
            endpoint,
        });
        self.arrivals.notify_waiters();

        let gate = self.gates.lock().unwrap().get(&endpoint).cloned();
        if let Some(gate) = gate {
            // Only closing the gate wakes us
            let _ = gate.acquire().await;
        }
    }

    fn command_outcome(&self, id: &InstanceId, endpoint: Endpoint) -> ControlResult<()> {
        let outcome = {
            let state = self.state.lock().unwrap();
            state
                .instance_outcomes
                .get(&(id.clone(), endpoint))
                .or_else(|| state.outcomes.get(&endpoint))
                .copied()
                .unwrap_or(MockOutcome::Success)
        };

        match outcome {
            MockOutcome::Success => Ok(()),
            MockOutcome::Rejected => Err(ControlError::rejected(id.as_str(), endpoint.name())),
            MockOutcome::Unreachable => Err(ControlError::transport(
                id.as_str(),
                endpoint.name(),
                "connection refused",
            )),
            MockOutcome::HttpStatus(status) => Err(ControlError::http_status(
                id.as_str(),
                endpoint.name(),
                status,
            )),
        }
    }

    async fn command(&self, id: &InstanceId, endpoint: Endpoint) -> ControlResult<()> {
        self.enter(id, endpoint).await;
        self.command_outcome(id, endpoint)
    }

    fn next_progress(&self, id: &InstanceId) -> ProgressReply {
        let mut state = self.state.lock().unwrap();
        match state.progress.get_mut(id) {
            Some(script) if script.len() > 1 => script.pop_front().unwrap_or(ProgressReply::Empty),
            Some(script) => script.front().cloned().unwrap_or(ProgressReply::Empty),
            None => ProgressReply::Empty,
        }
    }
}

#[async_trait]
impl ControlApi for MockControlApi {
    async fn start(&self, id: &InstanceId, request: &StartRequest) -> ControlResult<()> {
        self.state
            .lock()
            .unwrap()
            .start_requests
            .push(request.clone());
        self.command(id, Endpoint::Start).await
    }

    async fn stop(&self, id: &InstanceId) -> ControlResult<()> {
        self.command(id, Endpoint::Stop).await
    }

    async fn progress(&self, id: &InstanceId) -> ControlResult<Option<Progress>> {
        self.enter(id, Endpoint::Progress).await;
        match self.next_progress(id) {
            ProgressReply::Data(progress) => Ok(Some(progress)),
            ProgressReply::Empty => Ok(None),
            ProgressReply::Unreachable => Err(ControlError::transport(
                id.as_str(),
                Endpoint::Progress.name(),
                "connection refused",
            )),
        }
    }

    async fn commit(&self, id: &InstanceId) -> ControlResult<()> {
        self.command(id, Endpoint::Commit).await
    }

    async fn reverse(&self, id: &InstanceId) -> ControlResult<()> {
        self.command(id, Endpoint::Reverse).await
    }
}
