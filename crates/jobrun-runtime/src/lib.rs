//! jobrun runtime
//!
//! Client-side scheduler for dependent remote operations:
//! - [`RemoteTask`] wraps one remote operation (submit, poll, stop)
//! - [`Job`] owns a task and waits on its prerequisite jobs
//! - [`Session`] registers jobs and drives them concurrently
//!
//! Domain constructors (`upload`, `train`, `predict`, ...) live on
//! [`Session`].

pub mod config;
pub mod domain;
pub mod inputs;
pub mod job;
pub mod progress;
pub mod session;
pub mod task;

#[cfg(test)]
pub(crate) mod testing;

pub use config::Intervals;
pub use inputs::{ColumnSpec, PredictInput, SetupInput, TrainInput, TrainTsInput, UploadInput};
pub use job::{Job, JobKind};
pub use progress::{ProgressObserver, TracingProgress};
pub use session::{Session, SessionBuilder};
pub use task::RemoteTask;
