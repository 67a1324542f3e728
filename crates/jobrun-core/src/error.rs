//! Core domain errors.

use thiserror::Error;

/// Core domain errors for jobrun.
#[derive(Debug, Error, PartialEq)]
pub enum CoreError {
    /// Status string not understood.
    #[error("Unknown status: {0}")]
    UnknownStatus(String),

    /// Evaluator name not in the supported set.
    #[error("Unknown evaluator: {0}")]
    UnknownEvaluator(String),

    /// Algorithm name not in the supported set.
    #[error("Unknown algorithm: {0}")]
    UnknownAlgorithm(String),

    /// Attribute name not carried by a job.
    #[error("No such attribute: {0}")]
    UnknownAttribute(String),

    /// A request could not be built from its inputs.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
