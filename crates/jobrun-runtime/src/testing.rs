//! In-memory [`CoreApi`] for scheduler tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;

use jobrun_client::{ClientConfig, ClientError, CoreApi, Operation, Submission};
use jobrun_core::RemoteId;

use crate::config::Intervals;
use crate::progress::ProgressObserver;
use crate::session::Session;

/// Scripted fake of the remote service.
///
/// Submissions answer from a per-operation queue of task ids. Polls replay
/// a per-task script, repeating its last entry; unscripted tasks report
/// `running` forever.
#[derive(Default)]
pub(crate) struct FakeApi {
    state: Mutex<FakeState>,
}

#[derive(Default)]
struct FakeState {
    submit_ids: HashMap<Operation, VecDeque<String>>,
    scripts: HashMap<String, VecDeque<Value>>,
    documents: HashMap<String, Value>,
    files: HashMap<String, Vec<u8>>,
    submit_delay: Option<Duration>,
    fail_polls: bool,
    unhealthy: bool,
    submissions: Vec<(Operation, Submission)>,
    cancels: Vec<RemoteId>,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Answer the next `operation` submission with task `task_id`.
    pub fn on_submit(&self, operation: Operation, task_id: &str) {
        self.lock()
            .submit_ids
            .entry(operation)
            .or_default()
            .push_back(task_id.to_string());
    }

    /// Poll responses for `task_id`, in order.
    pub fn script(&self, task_id: &str, responses: Vec<Value>) {
        self.lock()
            .scripts
            .insert(task_id.to_string(), responses.into());
    }

    /// Shorthand for a task that finishes on its first poll.
    pub fn finish(&self, task_id: &str, result: Value) {
        self.script(
            task_id,
            vec![json!({"status": "done", "progress": 1.0, "result": result})],
        );
    }

    /// Hold every submission for `delay` after it reaches the service.
    pub fn slow_submit(&self, delay: Duration) {
        self.lock().submit_delay = Some(delay);
    }

    pub fn fail_polls(&self) {
        self.lock().fail_polls = true;
    }

    pub fn set_unhealthy(&self) {
        self.lock().unhealthy = true;
    }

    pub fn document(&self, path: &str, body: Value) {
        self.lock().documents.insert(path.to_string(), body);
    }

    pub fn file(&self, path: &str, bytes: &[u8]) {
        self.lock().files.insert(path.to_string(), bytes.to_vec());
    }

    pub fn submissions(&self) -> Vec<(Operation, Submission)> {
        self.lock().submissions.clone()
    }

    pub fn cancels(&self) -> Vec<RemoteId> {
        self.lock().cancels.clone()
    }
}

#[async_trait]
impl CoreApi for FakeApi {
    async fn submit(
        &self,
        operation: Operation,
        submission: Submission,
    ) -> Result<Value, ClientError> {
        let delay = {
            let mut state = self.lock();
            state.submissions.push((operation, submission));
            state.submit_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        match state.submit_ids.get_mut(&operation).and_then(VecDeque::pop_front) {
            Some(id) => Ok(json!({"_id": id, "status": "pending"})),
            None => Err(ClientError::Submission(format!("HTTP 400: {}", operation.path()))),
        }
    }

    async fn poll(&self, task_id: &RemoteId) -> Result<Value, ClientError> {
        let mut state = self.lock();
        if state.fail_polls {
            return Err(ClientError::Transport(format!("HTTP 503: /tasks/{}", task_id)));
        }
        let response = match state.scripts.get_mut(task_id.as_str()) {
            Some(script) if script.len() > 1 => script.pop_front(),
            Some(script) => script.front().cloned(),
            None => None,
        };
        Ok(response.unwrap_or_else(|| json!({"_id": task_id.as_str(), "status": "running"})))
    }

    async fn cancel(&self, task_id: &RemoteId) -> Result<(), ClientError> {
        self.lock().cancels.push(task_id.clone());
        Ok(())
    }

    async fn health(&self) -> Result<(), ClientError> {
        if self.lock().unhealthy {
            Err(ClientError::Connection("HTTP 401: /workers/status".to_string()))
        } else {
            Ok(())
        }
    }

    async fn get_json(&self, path: &str) -> Result<Value, ClientError> {
        self.lock()
            .documents
            .get(path)
            .cloned()
            .ok_or_else(|| ClientError::Transport(format!("HTTP 404: {}", path)))
    }

    async fn fetch(&self, path: &str) -> Result<Vec<u8>, ClientError> {
        self.lock()
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| ClientError::Transport(format!("HTTP 404: {}", path)))
    }
}

/// Observer that records every increment it receives.
#[derive(Default)]
pub(crate) struct RecordingProgress {
    deltas: Mutex<Vec<(String, f64)>>,
}

impl RecordingProgress {
    pub fn deltas(&self) -> Vec<f64> {
        self.deltas
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, delta)| *delta)
            .collect()
    }
}

impl ProgressObserver for RecordingProgress {
    fn advance(&self, task: &str, delta: f64) {
        self.deltas
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((task.to_string(), delta));
    }
}

/// Open a session over `api` with default intervals.
pub(crate) async fn open_session(api: &Arc<FakeApi>) -> Session {
    open_session_with(api, Intervals::default()).await
}

pub(crate) async fn open_session_with(api: &Arc<FakeApi>, intervals: Intervals) -> Session {
    Session::with_api(api.clone(), ClientConfig::default())
        .with_intervals(intervals)
        .open()
        .await
        .unwrap()
}

/// Log output captured by [`capture_logs`].
#[derive(Clone, Default)]
pub(crate) struct CapturedLogs {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl CapturedLogs {
    pub fn contents(&self) -> String {
        let buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, bytes: &[u8]) -> std::io::Result<usize> {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Route this thread's log events into a buffer until the guard drops.
pub(crate) fn capture_logs() -> (CapturedLogs, DefaultGuard) {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (logs, guard)
}
