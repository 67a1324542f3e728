//! Request inputs for each kind of job.
//!
//! Inputs hold handles to the jobs they depend on and read their ids only
//! when the request body is built, right before submission.

use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use jobrun_client::Submission;
use jobrun_core::{Algorithm, CoreError, Evaluator, RemoteId};

use crate::job::Job;

/// Type annotation for one data column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSpec {
    pub id: String,
    pub data_type: String,
}

impl ColumnSpec {
    pub fn new(id: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            data_type: data_type.into(),
        }
    }
}

/// CSV file to upload.
#[derive(Debug, Clone)]
pub struct UploadInput {
    pub filename: String,
    pub bytes: Vec<u8>,
    /// Run exploratory analysis on the uploaded data.
    pub eda: bool,
}

impl UploadInput {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
            eda: true,
        }
    }

    /// Read a CSV file from disk.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "data.csv".to_string());
        Ok(Self::new(filename, bytes))
    }

    pub fn with_eda(mut self, eda: bool) -> Self {
        self.eda = eda;
        self
    }
}

/// Retype columns of uploaded data.
#[derive(Clone)]
pub struct SetupInput {
    pub data: Job,
    pub columns: Vec<ColumnSpec>,
    pub eda: Option<bool>,
    pub callback: Option<String>,
}

impl SetupInput {
    pub fn new(data: &Job, columns: Vec<ColumnSpec>) -> Self {
        Self {
            data: data.clone(),
            columns,
            eda: None,
            callback: None,
        }
    }
}

/// Model training settings.
#[derive(Clone)]
pub struct TrainInput {
    pub data: Job,
    pub target: String,
    pub algos: Vec<Algorithm>,
    pub evaluator: Option<Evaluator>,
    pub features: Option<Vec<String>>,
    pub max_model: Option<u32>,
    pub max_run_time: Option<u64>,
    pub tolerance: Option<f64>,
    pub nfold: Option<u32>,
    pub seed: Option<u64>,
    pub test_base_id: Option<String>,
    pub callback: Option<String>,
}

impl TrainInput {
    pub fn new(data: &Job, target: impl Into<String>, algos: Vec<Algorithm>) -> Self {
        Self {
            data: data.clone(),
            target: target.into(),
            algos,
            evaluator: None,
            features: None,
            max_model: None,
            max_run_time: None,
            tolerance: None,
            nfold: None,
            seed: None,
            test_base_id: None,
            callback: None,
        }
    }

    pub fn with_evaluator(mut self, evaluator: Evaluator) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn with_max_model(mut self, max_model: u32) -> Self {
        self.max_model = Some(max_model);
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = Some(tolerance);
        self
    }

    pub fn with_features(mut self, features: Vec<String>) -> Self {
        self.features = Some(features);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Time series forecast training settings.
#[derive(Clone)]
pub struct TrainTsInput {
    pub data: Job,
    pub target: String,
    pub datetime_column: String,
    pub forecast_horizon: u32,
    pub gap: u32,
    pub time_unit: Option<String>,
    pub endogenous_features: Option<Vec<String>>,
    pub evaluator: Option<Evaluator>,
    pub max_model: Option<u32>,
    pub seed: Option<u64>,
    pub callback: Option<String>,
}

impl TrainTsInput {
    pub fn new(
        data: &Job,
        target: impl Into<String>,
        datetime_column: impl Into<String>,
        forecast_horizon: u32,
        gap: u32,
    ) -> Self {
        Self {
            data: data.clone(),
            target: target.into(),
            datetime_column: datetime_column.into(),
            forecast_horizon,
            gap,
            time_unit: None,
            endogenous_features: None,
            evaluator: None,
            max_model: None,
            seed: None,
            callback: None,
        }
    }
}

/// Prediction settings: test data plus the experiment whose best model is used.
#[derive(Clone)]
pub struct PredictInput {
    pub data: Job,
    pub experiment: Job,
    pub keep_columns: Option<Vec<String>>,
    pub threshold: Option<f64>,
    pub callback: Option<String>,
}

impl PredictInput {
    pub fn new(data: &Job, experiment: &Job) -> Self {
        Self {
            data: data.clone(),
            experiment: experiment.clone(),
            keep_columns: None,
            threshold: None,
            callback: None,
        }
    }

    pub fn with_keep_columns(mut self, columns: Vec<String>) -> Self {
        self.keep_columns = Some(columns);
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }
}

#[derive(Serialize)]
struct SetupBody<'a> {
    data_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data_source: Option<Value>,
    data_columns: &'a [ColumnSpec],
    #[serde(skip_serializing_if = "Option::is_none")]
    eda: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    callback: Option<&'a str>,
}

#[derive(Serialize)]
struct TrainBody<'a> {
    target: &'a str,
    train_data_id: &'a str,
    algos: &'a [Algorithm],
    #[serde(skip_serializing_if = "Option::is_none")]
    evaluator: Option<Evaluator>,
    #[serde(skip_serializing_if = "Option::is_none")]
    features: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_model: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_run_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tolerance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    nfold: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    test_base_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    callback: Option<&'a str>,
}

#[derive(Serialize)]
struct TrainTsBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    callback: Option<&'a str>,
    build_control: TsBuildControl,
    model_spec: TsModelSpec<'a>,
    input_spec: TsInputSpec<'a>,
}

#[derive(Serialize)]
struct TsBuildControl {
    #[serde(skip_serializing_if = "Option::is_none")]
    evaluator: Option<Evaluator>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_model: Option<u32>,
}

#[derive(Serialize)]
struct TsModelSpec<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    endogenous_features: Option<&'a [String]>,
}

#[derive(Serialize)]
struct TsInputSpec<'a> {
    train_data_id: &'a str,
    target: &'a str,
    datetime_column: &'a str,
    forecast_horizon: u32,
    gap: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    time_unit: Option<&'a str>,
}

#[derive(Serialize)]
struct PredictBody<'a> {
    data_id: &'a str,
    model_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    keep_columns: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    callback: Option<&'a str>,
}

/// What a job submits, with the jobs it depends on.
#[derive(Clone)]
pub(crate) enum Request {
    Upload(UploadInput),
    Setup(SetupInput),
    Train(TrainInput),
    TrainTs(TrainTsInput),
    Predict(PredictInput),
    PredictTs(PredictInput),
}

impl Request {
    /// Jobs that must succeed before this request is submitted.
    pub(crate) fn prerequisites(&self) -> Vec<Job> {
        match self {
            Self::Upload(_) => Vec::new(),
            Self::Setup(input) => vec![input.data.clone()],
            Self::Train(input) => vec![input.data.clone()],
            Self::TrainTs(input) => vec![input.data.clone()],
            Self::Predict(input) | Self::PredictTs(input) => {
                vec![input.data.clone(), input.experiment.clone()]
            }
        }
    }

    /// Build the request body from the current state of the prerequisites.
    pub(crate) fn build(&self) -> Result<Submission, CoreError> {
        let body = match self {
            Self::Upload(input) => {
                return Ok(Submission::Csv {
                    filename: input.filename.clone(),
                    bytes: input.bytes.clone(),
                    eda: input.eda,
                })
            }
            Self::Setup(input) => {
                let data_id = id_of(&input.data)?;
                to_json(&SetupBody {
                    data_id: data_id.as_str(),
                    data_source: input.data.record().accessor,
                    data_columns: &input.columns,
                    eda: input.eda,
                    callback: input.callback.as_deref(),
                })?
            }
            Self::Train(input) => {
                let data_id = id_of(&input.data)?;
                to_json(&TrainBody {
                    target: &input.target,
                    train_data_id: data_id.as_str(),
                    algos: &input.algos,
                    evaluator: input.evaluator,
                    features: input.features.as_deref(),
                    max_model: input.max_model,
                    max_run_time: input.max_run_time,
                    tolerance: input.tolerance,
                    nfold: input.nfold,
                    seed: input.seed,
                    test_base_id: input.test_base_id.as_deref(),
                    callback: input.callback.as_deref(),
                })?
            }
            Self::TrainTs(input) => {
                let data_id = id_of(&input.data)?;
                to_json(&TrainTsBody {
                    callback: input.callback.as_deref(),
                    build_control: TsBuildControl {
                        evaluator: input.evaluator,
                        seed: input.seed,
                        max_model: input.max_model,
                    },
                    model_spec: TsModelSpec {
                        endogenous_features: input.endogenous_features.as_deref(),
                    },
                    input_spec: TsInputSpec {
                        train_data_id: data_id.as_str(),
                        target: &input.target,
                        datetime_column: &input.datetime_column,
                        forecast_horizon: input.forecast_horizon,
                        gap: input.gap,
                        time_unit: input.time_unit.as_deref(),
                    },
                })?
            }
            Self::Predict(input) | Self::PredictTs(input) => {
                let data_id = id_of(&input.data)?;
                let model = input.experiment.best_model().ok_or_else(|| {
                    CoreError::InvalidInput(format!(
                        "experiment {} has no best model",
                        input.experiment.name()
                    ))
                })?;
                to_json(&PredictBody {
                    data_id: data_id.as_str(),
                    model_id: &model.model_id,
                    keep_columns: input.keep_columns.as_deref(),
                    threshold: input.threshold,
                    callback: input.callback.as_deref(),
                })?
            }
        };
        Ok(Submission::Json(body))
    }
}

fn id_of(job: &Job) -> Result<RemoteId, CoreError> {
    job.id()
        .ok_or_else(|| CoreError::InvalidInput(format!("job {} has no id", job.name())))
}

fn to_json<T: Serialize>(body: &T) -> Result<Value, CoreError> {
    serde_json::to_value(body).map_err(|e| CoreError::InvalidInput(e.to_string()))
}
