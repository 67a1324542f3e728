//! Error types for the client.

use thiserror::Error;

/// Errors that can occur when talking to the remote service.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Liveness probe failed when opening a session.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The service rejected a submission or returned no identifier.
    #[error("submission failed: {0}")]
    Submission(String),

    /// A status query, cancellation or download failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// Work was registered or run without an open session.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An artifact was requested before the job succeeded.
    #[error("not ready: {0}")]
    NotReady(String),

    /// The job kind has no such artifact.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}
