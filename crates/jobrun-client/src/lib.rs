//! Client library for the remote training/prediction service.
//!
//! Provides the [`CoreApi`] seam the scheduler talks through, and an HTTP
//! implementation of it.

pub mod api;
pub mod config;
pub mod error;
pub mod http;
pub mod operation;

pub use api::{remote_id_of, CoreApi};
pub use config::ClientConfig;
pub use error::ClientError;
pub use http::HttpClient;
pub use operation::{Operation, Submission};
