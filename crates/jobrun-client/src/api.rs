//! The remote-service seam used by tasks and jobs.

use async_trait::async_trait;
use serde_json::Value;

use jobrun_core::RemoteId;

use crate::error::ClientError;
use crate::operation::{Operation, Submission};

/// Operations the scheduler needs from the remote service.
///
/// Implement this trait to point the scheduler at a different transport;
/// tests use an in-memory fake.
#[async_trait]
pub trait CoreApi: Send + Sync {
    /// Submit an operation. Non-success responses are
    /// [`ClientError::Submission`]; the returned body should carry `_id`.
    async fn submit(&self, operation: Operation, submission: Submission)
        -> Result<Value, ClientError>;

    /// Query a task by id. Failures are [`ClientError::Transport`].
    async fn poll(&self, task_id: &RemoteId) -> Result<Value, ClientError>;

    /// Ask the service to stop a pending or running task.
    async fn cancel(&self, task_id: &RemoteId) -> Result<(), ClientError>;

    /// Liveness/authorization probe.
    async fn health(&self) -> Result<(), ClientError>;

    /// Fetch JSON metadata (`/data/{id}`, `/experiments/{id}`, ...).
    async fn get_json(&self, path: &str) -> Result<Value, ClientError>;

    /// Fetch raw bytes (`/data/{id}/file`, `/models/{id}/download`).
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, ClientError>;
}

/// Extract the `_id` a submission response must carry.
pub fn remote_id_of(response: &Value) -> Result<RemoteId, ClientError> {
    response
        .get("_id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(RemoteId::from)
        .ok_or_else(|| ClientError::Submission("response carries no _id".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_remote_id_of() {
        let id = remote_id_of(&json!({"_id": "4uploadid"})).unwrap();
        assert_eq!(id.as_str(), "4uploadid");

        assert!(matches!(
            remote_id_of(&json!({"message": "queued"})),
            Err(ClientError::Submission(_))
        ));
        assert!(remote_id_of(&json!({"_id": ""})).is_err());
    }
}
