//! Jobs: one remote task plus the jobs it depends on.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use jobrun_client::{ClientError, CoreApi, Operation};
use jobrun_core::{
    generate_name, is_present, select_best_model, BestModel, CoreError, Evaluator, JobAttr,
    JobRecord, RemoteId, Status,
};

use crate::config::Intervals;
use crate::inputs::Request;
use crate::session::Session;
use crate::task::RemoteTask;

/// What a job produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    DataUpload,
    DataSetup,
    Experiment,
    ExperimentTs,
    PredictResult,
    PredictTsResult,
}

impl JobKind {
    pub fn operation(&self) -> Operation {
        match self {
            Self::DataUpload => Operation::Upload,
            Self::DataSetup => Operation::Setup,
            Self::Experiment => Operation::Train,
            Self::ExperimentTs => Operation::TrainTimeSeries,
            Self::PredictResult => Operation::Predict,
            Self::PredictTsResult => Operation::PredictTimeSeries,
        }
    }

    /// Prefix of generated job names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DataUpload => "DataUpload",
            Self::DataSetup => "DataSetup",
            Self::Experiment => "Experiment",
            Self::ExperimentTs => "ExperimentTS",
            Self::PredictResult => "PredictResult",
            Self::PredictTsResult => "PredictTSResult",
        }
    }

    /// Experiments pick a best model once training succeeds.
    pub fn is_experiment(&self) -> bool {
        matches!(self, Self::Experiment | Self::ExperimentTs)
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle to a job. Clones share the same job.
///
/// A job waits until its prerequisites finish, submits its task only if all
/// of them succeeded, then polls the task to completion. Failures of the job
/// itself end in `Fail` and are never raised; only transport errors escape
/// [`Job::run`].
#[derive(Clone)]
pub struct Job {
    inner: Arc<JobInner>,
}

struct JobInner {
    name: String,
    kind: JobKind,
    task: RemoteTask,
    prerequisites: Vec<Job>,
    request: Option<Request>,
    select_model_by: Evaluator,
    intervals: Intervals,
    api: Arc<dyn CoreApi>,
    state: Mutex<JobState>,
}

#[derive(Debug, Default)]
struct JobState {
    status: Status,
    result: Option<Value>,
    record: JobRecord,
    best_model: Option<BestModel>,
    prerequisite_report: Vec<(String, Status)>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub(crate) fn new(
        session: &Session,
        kind: JobKind,
        name: Option<&str>,
        request: Request,
        select_model_by: Evaluator,
    ) -> Self {
        Self::build(session, kind, name, Some(request), select_model_by, JobState::default())
    }

    /// A finished job standing for an object that already exists remotely.
    pub(crate) fn attached(
        session: &Session,
        kind: JobKind,
        name: Option<&str>,
        id: RemoteId,
        metadata: Value,
        select_model_by: Evaluator,
    ) -> Self {
        let mut record = JobRecord::default();
        record.absorb(&metadata);
        record.id = Some(id);
        let state = JobState {
            status: Status::Done,
            result: Some(metadata),
            record,
            finished_at: Some(Utc::now()),
            ..JobState::default()
        };

        let job = Self::build(session, kind, name, None, select_model_by, state);
        if kind.is_experiment() {
            job.choose_best_model();
        }
        job
    }

    fn build(
        session: &Session,
        kind: JobKind,
        name: Option<&str>,
        request: Option<Request>,
        select_model_by: Evaluator,
        state: JobState,
    ) -> Self {
        let prerequisites = request.as_ref().map(Request::prerequisites).unwrap_or_default();
        let task = RemoteTask::new(kind.operation(), session.api(), session.observer());

        Self {
            inner: Arc::new(JobInner {
                name: generate_name(kind.as_str(), name),
                kind,
                task,
                prerequisites,
                request,
                select_model_by,
                intervals: session.intervals(),
                api: session.api(),
                state: Mutex::new(state),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, JobState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drive the job to a terminal status.
    ///
    /// Returns an error only when polling the service fails; the job may
    /// then be left non-terminal. With a deadline configured, a job that
    /// exceeds it is stopped and then driven until its task settles.
    pub async fn run(&self) -> Result<(), ClientError> {
        let Some(deadline) = self.inner.intervals.deadline else {
            return self.execute().await;
        };

        // Stopped, not dropped: an in-flight submission cancels its own task.
        let execution = self.execute();
        tokio::pin!(execution);
        tokio::select! {
            outcome = &mut execution => outcome,
            _ = tokio::time::sleep(deadline) => {
                warn!(job = %self.inner.name, deadline_secs = deadline.as_secs(), "Job exceeded its deadline, stopping");
                self.stop().await;
                execution.await
            }
        }
    }

    async fn execute(&self) -> Result<(), ClientError> {
        if !self.wait_for_prerequisites().await {
            return Ok(());
        }
        self.drive_task().await?;
        self.finish();
        Ok(())
    }

    /// Sleep until every prerequisite is terminal or one of them failed.
    ///
    /// Returns true if the task may be submitted. Marks the job `Fail` when
    /// a prerequisite did not succeed.
    async fn wait_for_prerequisites(&self) -> bool {
        let prerequisites = &self.inner.prerequisites;

        loop {
            if self.status().is_terminal() {
                return false;
            }
            let all_done = prerequisites.iter().all(Job::is_done);
            let any_failed = prerequisites.iter().any(Job::is_fail);
            if all_done || any_failed {
                break;
            }
            debug!(job = %self.inner.name, "Waiting for prerequisites");
            tokio::time::sleep(self.inner.intervals.wait).await;
        }

        if prerequisites.iter().all(Job::is_success) {
            return true;
        }

        let report: Vec<(String, Status)> = prerequisites
            .iter()
            .map(|job| (job.name().to_string(), job.status()))
            .collect();
        {
            let mut state = self.lock();
            if state.status.is_terminal() {
                return false;
            }
            state.status = Status::Fail;
            state.prerequisite_report = report.clone();
            state.finished_at = Some(Utc::now());
        }
        warn!(job = %self.inner.name, prerequisites = ?report, "Prerequisite failed, job not submitted");
        false
    }

    /// Submit the task and poll it until it is terminal.
    async fn drive_task(&self) -> Result<(), ClientError> {
        {
            let mut state = self.lock();
            if state.status.is_terminal() {
                return Ok(());
            }
            state.status = Status::Running;
            state.started_at = Some(Utc::now());
        }
        info!(job = %self.inner.name, kind = %self.inner.kind, "Job running");

        let submission = match &self.inner.request {
            Some(request) => request.build(),
            None => Err(CoreError::InvalidInput("job has nothing to submit".to_string())),
        };
        let submission = match submission {
            Ok(submission) => submission,
            Err(e) => {
                warn!(job = %self.inner.name, error = %e, "Could not build request");
                self.mark_failed();
                return Ok(());
            }
        };
        if let Err(e) = self.inner.task.submit(submission).await {
            warn!(job = %self.inner.name, error = %e, "Submission failed");
            self.mark_failed();
            return Ok(());
        }

        loop {
            self.inner.task.poll().await?;
            self.absorb_task_result();
            if self.inner.task.is_done() {
                return Ok(());
            }
            debug!(
                job = %self.inner.name,
                task = %self.inner.task.name(),
                progress = self.inner.task.progress(),
                "Task still running"
            );
            tokio::time::sleep(self.inner.intervals.poll).await;
        }
    }

    fn absorb_task_result(&self) {
        let Some(result) = self.inner.task.result().filter(is_present) else {
            return;
        };
        let mut state = self.lock();
        state.record.absorb(&result);
        state.result = Some(result);
    }

    fn mark_failed(&self) {
        let mut state = self.lock();
        state.status = Status::Fail;
        state.result = None;
        state.finished_at = Some(Utc::now());
    }

    /// Adopt the task's final status unless the job was stopped meanwhile.
    fn finish(&self) {
        let task_status = self.inner.task.status();
        let succeeded = {
            let mut state = self.lock();
            if state.status.is_terminal() {
                debug!(job = %self.inner.name, "Job was stopped, keeping its status");
                return;
            }
            state.status = task_status;
            state.finished_at = Some(Utc::now());
            state.status == Status::Done && state.result.is_some()
        };
        info!(job = %self.inner.name, status = %task_status, "Job finished");

        if succeeded && self.inner.kind.is_experiment() {
            self.choose_best_model();
        }
    }

    fn choose_best_model(&self) {
        let mut state = self.lock();
        let metric = self.inner.select_model_by.resolve(state.record.model_type());
        match select_best_model(state.record.attributes.as_ref(), metric.as_str()) {
            Ok(best) => {
                info!(job = %self.inner.name, model = %best.model_id, metric = %metric, score = best.score, "Selected best model");
                state.best_model = Some(best);
            }
            Err(e) => {
                error!(job = %self.inner.name, metric = %metric, error = %e, "Best model selection failed");
            }
        }
    }

    /// Stop the job.
    ///
    /// A pending job fails without touching its task. A running job fails
    /// and its task is stopped if it has not finished. Stopping a finished
    /// job does nothing.
    pub async fn stop(&self) {
        let previous = {
            let mut state = self.lock();
            let previous = state.status;
            if !previous.is_terminal() {
                state.status = Status::Fail;
                state.finished_at = Some(Utc::now());
            }
            previous
        };

        match previous {
            Status::Pending => info!(job = %self.inner.name, "Stopped pending job"),
            Status::Running => {
                if !self.inner.task.is_done() {
                    self.inner.task.stop().await;
                }
                info!(job = %self.inner.name, "Stopped running job");
            }
            status => info!(job = %self.inner.name, status = %status, "Job already finished"),
        }
    }

    /// Current value of a named attribute.
    ///
    /// Besides the record attributes (`_id`, `schema`, `attributes`, ...)
    /// this knows `status`, `name`, `result`, `progress`, `best_model` and
    /// `task_id`. Values may be read mid-run but are only final once the
    /// job is done.
    pub fn get(&self, attr: &str) -> Result<Option<Value>, CoreError> {
        let value = match attr {
            "name" => Some(Value::String(self.inner.name.clone())),
            "progress" => Some(json!(self.inner.task.progress())),
            "task_id" => self.inner.task.remote_id().map(|id| Value::String(id.into_inner())),
            "status" => Some(Value::String(self.status().as_str().to_string())),
            "result" => self.result(),
            "best_model" => self.best_model().map(|best| Value::String(best.model_id)),
            other => {
                let attr = other.parse::<JobAttr>()?;
                self.lock().record.get(attr)
            }
        };
        Ok(value)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn kind(&self) -> JobKind {
        self.inner.kind
    }

    /// Id of the produced object, from the task result's `_id`.
    pub fn id(&self) -> Option<RemoteId> {
        self.lock().record.id.clone()
    }

    pub fn status(&self) -> Status {
        self.lock().status
    }

    pub fn result(&self) -> Option<Value> {
        self.lock().result.clone()
    }

    pub fn record(&self) -> JobRecord {
        self.lock().record.clone()
    }

    pub fn task(&self) -> &RemoteTask {
        &self.inner.task
    }

    pub fn prerequisites(&self) -> &[Job] {
        &self.inner.prerequisites
    }

    /// Prerequisite names and statuses seen when the job failed because of them.
    pub fn prerequisite_report(&self) -> Vec<(String, Status)> {
        self.lock().prerequisite_report.clone()
    }

    /// Best model of a successful experiment.
    pub fn best_model(&self) -> Option<BestModel> {
        self.lock().best_model.clone()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.lock().started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.lock().finished_at
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

    fn ready_id(&self, artifact: &str) -> Result<RemoteId, ClientError> {
        let id = if self.is_success() { self.id() } else { None };
        id.ok_or_else(|| {
            error!(job = %self.inner.name, status = %self.status(), artifact, "Job has not succeeded");
            ClientError::NotReady(format!("{} of job {}", artifact, self.inner.name))
        })
    }

    /// Bytes of the uploaded, set up or predicted data.
    pub async fn download(&self) -> Result<Vec<u8>, ClientError> {
        if self.inner.kind.is_experiment() {
            return Err(ClientError::Unsupported(format!(
                "{} has no data file, download its best model instead",
                self.inner.name
            )));
        }
        let id = self.ready_id("data file")?;
        self.inner.api.fetch(&format!("/data/{}/file", id)).await
    }

    /// The data file as text.
    pub async fn show(&self) -> Result<String, ClientError> {
        let bytes = self.download().await?;
        String::from_utf8(bytes).map_err(|e| ClientError::Serialization(e.to_string()))
    }

    /// Metadata of the produced data (`/data/{id}`).
    pub async fn data_details(&self) -> Result<Value, ClientError> {
        let id = self.ready_id("data details")?;
        self.inner.api.get_json(&format!("/data/{}", id)).await
    }

    /// Archive of an experiment's best model.
    pub async fn best_model_download(&self) -> Result<Vec<u8>, ClientError> {
        match self.inner.kind {
            JobKind::Experiment => {}
            JobKind::ExperimentTs => {
                return Err(ClientError::Unsupported(
                    "time series models cannot be downloaded".to_string(),
                ))
            }
            kind => {
                return Err(ClientError::Unsupported(format!("{} has no models", kind)));
            }
        }
        self.ready_id("best model")?;
        let best = self
            .best_model()
            .ok_or_else(|| ClientError::NotReady(format!("{} has no best model", self.inner.name)))?;
        self.inner
            .api
            .fetch(&format!("/models/{}/download", best.model_id))
            .await
    }

    /// Metadata of an experiment's best model.
    pub async fn best_model_details(&self) -> Result<Value, ClientError> {
        if !self.inner.kind.is_experiment() {
            return Err(ClientError::Unsupported(format!(
                "{} has no models",
                self.inner.kind
            )));
        }
        let experiment = self.ready_id("best model")?;
        let best = self
            .best_model()
            .ok_or_else(|| ClientError::NotReady(format!("{} has no best model", self.inner.name)))?;
        let collection = match self.inner.kind {
            JobKind::ExperimentTs => "multimodels",
            _ => "models",
        };
        self.inner
            .api
            .get_json(&format!("/experiments/{}/{}/{}", experiment, collection, best.model_id))
            .await
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("name", &self.inner.name)
            .field("kind", &self.inner.kind)
            .field("status", &self.status())
            .finish()
    }
}
