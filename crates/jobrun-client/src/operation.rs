//! Remote operations and their request bodies.

use std::fmt;

use serde_json::Value;

/// A long-running operation the service executes as a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Upload a CSV file.
    Upload,
    /// Set up (retype/annotate) uploaded data.
    Setup,
    /// Train models.
    Train,
    /// Train time series forecast models.
    TrainTimeSeries,
    /// Predict with a trained model.
    Predict,
    /// Predict with a time series model.
    PredictTimeSeries,
}

impl Operation {
    /// Endpoint the operation is submitted to.
    pub fn path(&self) -> &'static str {
        match self {
            Self::Upload => "/v2/upload",
            Self::Setup => "/v2/tasks/setup",
            Self::Train => "/v2/tasks/train",
            Self::TrainTimeSeries => "/v2/tasks/train_time_series",
            Self::Predict => "/v2/tasks/predict",
            Self::PredictTimeSeries => "/v2/tasks/predict/tsmodel",
        }
    }

    /// Short name used as the display-name prefix of its tasks.
    pub fn task_prefix(&self) -> &'static str {
        match self {
            Self::Upload => "UploadTask",
            Self::Setup => "SetupTask",
            Self::Train => "TrainTask",
            Self::TrainTimeSeries => "TrainTSTask",
            Self::Predict => "PredictTask",
            Self::PredictTimeSeries => "PredictTSTask",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.task_prefix())
    }
}

/// Body of a submission.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// JSON request body.
    Json(Value),
    /// Multipart CSV upload.
    Csv {
        filename: String,
        bytes: Vec<u8>,
        eda: bool,
    },
}
