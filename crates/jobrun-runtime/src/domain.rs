//! Domain job constructors.
//!
//! Each constructor builds a [`Job`] of one [`JobKind`] and registers it on
//! the session; it runs on the next [`Session::run_pending`].

use jobrun_client::ClientError;
use jobrun_core::{Evaluator, RemoteId};

use crate::inputs::{PredictInput, Request, SetupInput, TrainInput, TrainTsInput, UploadInput};
use crate::job::{Job, JobKind};
use crate::session::Session;

impl Session {
    fn create(
        &self,
        kind: JobKind,
        name: Option<&str>,
        request: Request,
        select_model_by: Evaluator,
    ) -> Result<Job, ClientError> {
        let job = Job::new(self, kind, name, request, select_model_by);
        self.register(&job)?;
        Ok(job)
    }

    /// Upload a CSV file.
    pub fn upload(&self, input: UploadInput, name: Option<&str>) -> Result<Job, ClientError> {
        self.create(JobKind::DataUpload, name, Request::Upload(input), Evaluator::Auto)
    }

    /// Retype uploaded data once its upload succeeds.
    pub fn setup(&self, input: SetupInput, name: Option<&str>) -> Result<Job, ClientError> {
        self.create(JobKind::DataSetup, name, Request::Setup(input), Evaluator::Auto)
    }

    /// Train models; the best one by `select_model_by` is picked on success.
    pub fn train(
        &self,
        input: TrainInput,
        select_model_by: Evaluator,
        name: Option<&str>,
    ) -> Result<Job, ClientError> {
        self.create(JobKind::Experiment, name, Request::Train(input), select_model_by)
    }

    /// Train time series forecast models.
    pub fn train_ts(
        &self,
        input: TrainTsInput,
        select_model_by: Evaluator,
        name: Option<&str>,
    ) -> Result<Job, ClientError> {
        self.create(JobKind::ExperimentTs, name, Request::TrainTs(input), select_model_by)
    }

    /// Predict with the experiment's best model.
    pub fn predict(&self, input: PredictInput, name: Option<&str>) -> Result<Job, ClientError> {
        self.create(JobKind::PredictResult, name, Request::Predict(input), Evaluator::Auto)
    }

    pub fn predict_ts(&self, input: PredictInput, name: Option<&str>) -> Result<Job, ClientError> {
        self.create(
            JobKind::PredictTsResult,
            name,
            Request::PredictTs(input),
            Evaluator::Auto,
        )
    }

    /// A finished upload job for data that already exists on the service.
    pub async fn attach_data(&self, data_id: &str, name: Option<&str>) -> Result<Job, ClientError> {
        let metadata = self.api().get_json(&format!("/data/{}", data_id)).await?;
        let job = Job::attached(
            self,
            JobKind::DataUpload,
            name,
            RemoteId::new(data_id),
            metadata,
            Evaluator::Auto,
        );
        self.remember(&job)?;
        Ok(job)
    }

    /// A finished experiment for one trained earlier.
    pub async fn attach_experiment(
        &self,
        experiment_id: &str,
        select_model_by: Evaluator,
        name: Option<&str>,
    ) -> Result<Job, ClientError> {
        self.attach_trained(JobKind::Experiment, experiment_id, select_model_by, name)
            .await
    }

    /// A finished time series experiment, usable by [`Session::predict_ts`].
    pub async fn attach_experiment_ts(
        &self,
        experiment_id: &str,
        select_model_by: Evaluator,
        name: Option<&str>,
    ) -> Result<Job, ClientError> {
        self.attach_trained(JobKind::ExperimentTs, experiment_id, select_model_by, name)
            .await
    }

    async fn attach_trained(
        &self,
        kind: JobKind,
        experiment_id: &str,
        select_model_by: Evaluator,
        name: Option<&str>,
    ) -> Result<Job, ClientError> {
        let metadata = self
            .api()
            .get_json(&format!("/experiments/{}", experiment_id))
            .await?;
        let job = Job::attached(
            self,
            kind,
            name,
            RemoteId::new(experiment_id),
            metadata,
            select_model_by,
        );
        self.remember(&job)?;
        Ok(job)
    }
}
