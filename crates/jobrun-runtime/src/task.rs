//! A single remote operation observed by polling.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tracing::{debug, info, warn};

use jobrun_client::{remote_id_of, ClientError, CoreApi, Operation, Submission};
use jobrun_core::{generate_name, RemoteId, Status};

use crate::progress::ProgressObserver;

/// Submit/poll/stop wrapper around one remote operation.
///
/// Once the task reaches a terminal status it never changes again; late
/// poll responses are discarded.
pub struct RemoteTask {
    operation: Operation,
    name: String,
    api: Arc<dyn CoreApi>,
    observer: Arc<dyn ProgressObserver>,
    state: Mutex<TaskState>,
}

#[derive(Debug, Default)]
struct TaskState {
    status: Status,
    remote_id: Option<RemoteId>,
    result: Option<Value>,
    progress: f64,
    response: Option<Value>,
}

impl RemoteTask {
    pub fn new(
        operation: Operation,
        api: Arc<dyn CoreApi>,
        observer: Arc<dyn ProgressObserver>,
    ) -> Self {
        Self {
            operation,
            name: generate_name(operation.task_prefix(), None),
            api,
            observer,
            state: Mutex::new(TaskState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TaskState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Submit the operation. On success the task is `Running`.
    ///
    /// Errors leave the task `Pending`; nothing is retried. A task stopped
    /// before submission sends nothing. If it was stopped while the request
    /// was in flight, the new remote task is cancelled right away.
    pub async fn submit(&self, submission: Submission) -> Result<(), ClientError> {
        if self.status().is_terminal() {
            debug!(task = %self.name, "Task already finished, not submitting");
            return Ok(());
        }

        let response = self.api.submit(self.operation, submission).await?;
        let remote_id = remote_id_of(&response)?;

        let stopped = {
            let mut state = self.lock();
            state.remote_id = Some(remote_id.clone());
            state.response = Some(response);
            if state.status.is_terminal() {
                true
            } else {
                state.status = Status::Running;
                false
            }
        };

        if stopped {
            info!(task = %self.name, task_id = %remote_id, "Task stopped during submission, cancelling");
            self.cancel(&remote_id).await;
        } else {
            info!(task = %self.name, task_id = %remote_id, operation = %self.operation, "Task submitted");
        }
        Ok(())
    }

    /// Query the service once and record progress, result and status.
    ///
    /// Keys missing from the response leave the matching attribute as is.
    /// Does nothing once the task is terminal.
    pub async fn poll(&self) -> Result<(), ClientError> {
        let remote_id = {
            let state = self.lock();
            if state.status.is_terminal() {
                return Ok(());
            }
            state.remote_id.clone()
        };
        let Some(remote_id) = remote_id else {
            return Err(ClientError::Transport(format!(
                "task {} has not been submitted",
                self.name
            )));
        };

        let response = self.api.poll(&remote_id).await.map_err(|e| match e {
            ClientError::Transport(_) => e,
            other => ClientError::Transport(other.to_string()),
        })?;

        let delta = {
            let mut state = self.lock();
            if state.status.is_terminal() {
                debug!(task = %self.name, task_id = %remote_id, "Discarding poll response for finished task");
                return Ok(());
            }

            let mut delta = 0.0;
            if let Some(progress) = response.get("progress").and_then(Value::as_f64) {
                let progress = progress.clamp(0.0, 1.0);
                if progress > state.progress {
                    delta = progress - state.progress;
                    state.progress = progress;
                }
            }
            if let Some(id) = response.get("_id").and_then(Value::as_str).filter(|id| !id.is_empty()) {
                state.remote_id = Some(RemoteId::new(id));
            }
            if let Some(result) = response.get("result").filter(|r| !r.is_null()) {
                state.result = Some(result.clone());
            }
            match response.get("status").and_then(Value::as_str) {
                Some(raw) => match raw.parse::<Status>() {
                    Ok(status) => state.status = status,
                    Err(e) => warn!(task = %self.name, error = %e, "Ignoring unrecognised task status"),
                },
                None => debug!(task = %self.name, "Poll response carries no status"),
            }
            state.response = Some(response);
            delta
        };

        if delta > 0.0 {
            self.observer.advance(&self.name, delta);
        }
        Ok(())
    }

    /// Force the task to `Fail` and ask the service to stop it.
    ///
    /// Cancellation is best effort: a failed request is logged. Stopping a
    /// terminal task does nothing.
    pub async fn stop(&self) {
        let remote_id = {
            let mut state = self.lock();
            if state.status.is_terminal() {
                debug!(task = %self.name, status = %state.status, "Task already finished");
                return;
            }
            state.status = Status::Fail;
            state.remote_id.clone()
        };

        match remote_id {
            Some(remote_id) => self.cancel(&remote_id).await,
            None => info!(task = %self.name, "Stopped task before submission"),
        }
    }

    async fn cancel(&self, remote_id: &RemoteId) {
        match self.api.cancel(remote_id).await {
            Ok(()) => info!(task = %self.name, task_id = %remote_id, "Task cancelled"),
            Err(e) => warn!(task = %self.name, task_id = %remote_id, error = %e, "Failed to cancel task"),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn status(&self) -> Status {
        self.lock().status
    }

    /// Identifier assigned at submission; `None` until then.
    pub fn remote_id(&self) -> Option<RemoteId> {
        self.lock().remote_id.clone()
    }

    pub fn result(&self) -> Option<Value> {
        self.lock().result.clone()
    }

    /// Progress in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        self.lock().progress
    }

    /// Last raw response from the service.
    pub fn last_response(&self) -> Option<Value> {
        self.lock().response.clone()
    }

    pub fn is_done(&self) -> bool {
        self.status().is_terminal()
    }

    /// `Done` with a result.
    pub fn is_success(&self) -> bool {
        let state = self.lock();
        state.status == Status::Done && state.result.is_some()
    }

    pub fn is_fail(&self) -> bool {
        self.is_done() && !self.is_success()
    }
}
