//! jobrun Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Network/HTTP
//! - Async runtime specifics
//!
//! All types here describe the vocabulary shared by remote tasks and the
//! jobs that wrap them.

pub mod algorithm;
pub mod error;
pub mod evaluator;
pub mod ids;
pub mod model;
pub mod record;
pub mod status;

// Re-export commonly used types
pub use algorithm::Algorithm;
pub use error::CoreError;
pub use evaluator::Evaluator;
pub use ids::{generate_name, RemoteId};
pub use model::{select_best_model, BestModel, SelectionError};
pub use record::{is_present, JobAttr, JobRecord};
pub use status::Status;
