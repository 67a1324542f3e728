//! Session: connection settings, job registry and the run trigger.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use jobrun_client::{ClientConfig, ClientError, CoreApi, HttpClient};
use jobrun_core::Status;

use crate::config::Intervals;
use crate::job::Job;
use crate::progress::{ProgressObserver, TracingProgress};

/// Explicit scheduler state shared by every job created through it.
///
/// Jobs registered on a session run on the next [`Session::run_pending`].
/// Clones share the same session.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    config: ClientConfig,
    api: Arc<dyn CoreApi>,
    intervals: Intervals,
    observer: Arc<dyn ProgressObserver>,
    registry: Mutex<Registry>,
}

#[derive(Default)]
struct Registry {
    open: bool,
    pending: Vec<Job>,
    jobs: Vec<Job>,
}

/// Builder for [`Session`].
pub struct SessionBuilder {
    config: ClientConfig,
    api: Arc<dyn CoreApi>,
    intervals: Intervals,
    observer: Arc<dyn ProgressObserver>,
}

impl SessionBuilder {
    pub fn with_intervals(mut self, intervals: Intervals) -> Self {
        self.intervals = intervals;
        self
    }

    pub fn with_progress(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Probe the service and open the session.
    pub async fn open(self) -> Result<Session, ClientError> {
        self.api.health().await.map_err(|e| match e {
            ClientError::Connection(_) => e,
            other => ClientError::Connection(other.to_string()),
        })?;
        info!(endpoint = %self.config.endpoint, "Session opened");

        Ok(Session {
            inner: Arc::new(SessionInner {
                config: self.config,
                api: self.api,
                intervals: self.intervals,
                observer: self.observer,
                registry: Mutex::new(Registry {
                    open: true,
                    ..Registry::default()
                }),
            }),
        })
    }
}

impl Session {
    /// Connect to the service over HTTP.
    pub async fn connect(config: ClientConfig) -> Result<Session, ClientError> {
        let api = Arc::new(HttpClient::new(&config)?);
        Self::with_api(api, config).open().await
    }

    /// Start building a session over any [`CoreApi`].
    pub fn with_api(api: Arc<dyn CoreApi>, config: ClientConfig) -> SessionBuilder {
        SessionBuilder {
            config,
            api,
            intervals: Intervals::default(),
            observer: Arc::new(TracingProgress),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.inner.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub(crate) fn api(&self) -> Arc<dyn CoreApi> {
        self.inner.api.clone()
    }

    pub(crate) fn observer(&self) -> Arc<dyn ProgressObserver> {
        self.inner.observer.clone()
    }

    pub fn intervals(&self) -> Intervals {
        self.inner.intervals
    }

    pub fn is_open(&self) -> bool {
        self.lock().open
    }

    fn ensure_open(&self) -> Result<(), ClientError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(ClientError::Configuration("session is closed".to_string()))
        }
    }

    /// Queue a job for the next run and add it to the history.
    pub(crate) fn register(&self, job: &Job) -> Result<(), ClientError> {
        let mut registry = self.lock();
        if !registry.open {
            return Err(ClientError::Configuration(format!(
                "cannot register {} on a closed session",
                job.name()
            )));
        }
        registry.pending.push(job.clone());
        registry.jobs.push(job.clone());
        debug!(job = %job.name(), "Job registered");
        Ok(())
    }

    /// Add an already finished job to the history.
    pub(crate) fn remember(&self, job: &Job) -> Result<(), ClientError> {
        let mut registry = self.lock();
        if !registry.open {
            return Err(ClientError::Configuration("session is closed".to_string()));
        }
        registry.jobs.push(job.clone());
        Ok(())
    }

    /// Run every pending job concurrently until all of them finish.
    ///
    /// The pending list is emptied first; jobs registered while this runs
    /// wait for the next call. A transport error aborts the remaining jobs
    /// of the batch and is returned; those jobs may stay non-terminal.
    pub async fn run_pending(&self) -> Result<(), ClientError> {
        self.ensure_open()?;
        let pending = std::mem::take(&mut self.lock().pending);
        if pending.is_empty() {
            debug!("No pending jobs");
            return Ok(());
        }
        info!(jobs = pending.len(), "Running pending jobs");

        let mut set = JoinSet::new();
        for job in pending {
            set.spawn(async move { job.run().await });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(error = %e, "Job aborted, abandoning the rest of the batch");
                    set.abort_all();
                    return Err(e);
                }
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(e) => warn!(error = %e, "Job task cancelled"),
            }
        }

        info!("Pending jobs finished");
        Ok(())
    }

    /// Close the session, dropping history and jobs that never ran.
    pub fn close(&self) {
        let mut registry = self.lock();
        registry.open = false;
        registry.pending.clear();
        registry.jobs.clear();
        info!(endpoint = %self.inner.config.endpoint, "Session closed");
    }

    /// Every job created through this session, in creation order.
    pub fn all_jobs(&self) -> Vec<Job> {
        self.lock().jobs.clone()
    }

    /// Number of jobs waiting for the next run.
    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn jobs_by_name(&self, names: &[&str]) -> Vec<Job> {
        self.lock()
            .jobs
            .iter()
            .filter(|job| names.contains(&job.name()))
            .cloned()
            .collect()
    }

    /// `(name, status)` of every job, optionally restricted to `filter`
    /// and sorted by status name.
    pub fn jobs_status(&self, filter: Option<&[Status]>, sort_by_status: bool) -> Vec<(String, Status)> {
        let mut rows: Vec<(String, Status)> = self
            .all_jobs()
            .iter()
            .map(|job| (job.name().to_string(), job.status()))
            .filter(|(_, status)| filter.map_or(true, |wanted| wanted.contains(status)))
            .collect();
        if sort_by_status {
            rows.sort_by_key(|(_, status)| status.as_str());
        }
        rows
    }

    pub async fn stop_jobs(&self, jobs: &[Job]) {
        for job in jobs {
            job.stop().await;
        }
    }

    /// Stop every job that has not finished.
    pub async fn stop_all_jobs(&self) {
        let running: Vec<Job> = self
            .all_jobs()
            .into_iter()
            .filter(|job| !job.is_done())
            .collect();
        info!(jobs = running.len(), "Stopping all unfinished jobs");
        self.stop_jobs(&running).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inputs::{TrainInput, UploadInput};
    use crate::testing::{open_session, FakeApi, RecordingProgress};
    use jobrun_client::Operation;
    use jobrun_core::{Algorithm, Evaluator, RemoteId};
    use serde_json::json;
    use std::time::Duration;

    fn csv(name: &str) -> UploadInput {
        UploadInput::new(name, b"a,b\n1,2\n".to_vec())
    }

    #[tokio::test]
    async fn test_open_fails_when_unhealthy() {
        let api = FakeApi::new();
        api.set_unhealthy();

        let result = Session::with_api(api.clone(), ClientConfig::default()).open().await;
        assert!(matches!(result, Err(ClientError::Connection(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_pending_upload_with_progress() {
        let api = FakeApi::new();
        api.on_submit(Operation::Upload, "t1");
        api.script(
            "t1",
            vec![
                json!({"status": "running", "progress": 0.2}),
                json!({"status": "done", "progress": 1.0, "result": {"_id": "d1"}}),
            ],
        );
        let observer = Arc::new(RecordingProgress::default());
        let session = Session::with_api(api.clone(), ClientConfig::default())
            .with_progress(observer.clone())
            .open()
            .await
            .unwrap();
        let upload = session.upload(csv("train.csv"), None).unwrap();
        assert_eq!(session.pending_count(), 1);

        session.run_pending().await.unwrap();

        assert_eq!(session.pending_count(), 0);
        assert_eq!(upload.status(), Status::Done);
        assert_eq!(upload.id(), Some(RemoteId::new("d1")));
        let deltas = observer.deltas();
        assert_eq!(deltas.len(), 2);
        assert!((deltas[0] - 0.2).abs() < 1e-9);
        assert!((deltas[1] - 0.8).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_jobs_terminal_after_run() {
        let api = FakeApi::new();
        api.on_submit(Operation::Upload, "t1");
        api.on_submit(Operation::Train, "t2");
        api.script(
            "t1",
            vec![
                json!({"status": "running", "progress": 0.5}),
                json!({"status": "done", "result": {"_id": "d1"}}),
            ],
        );
        api.script(
            "t2",
            vec![
                json!({"status": "pending"}),
                json!({"status": "running"}),
                json!({"status": "invalid"}),
            ],
        );
        let session = open_session(&api).await;
        let upload = session.upload(csv("train.csv"), None).unwrap();
        let failed = session.upload(csv("broken.csv"), None).unwrap();
        session
            .train(TrainInput::new(&upload, "y", vec![Algorithm::Gbm]), Evaluator::Auto, None)
            .unwrap();
        session
            .train(TrainInput::new(&failed, "y", vec![Algorithm::Gbm]), Evaluator::Auto, None)
            .unwrap();

        session.run_pending().await.unwrap();

        for job in session.all_jobs() {
            assert!(job.is_done(), "{} is {}", job.name(), job.status());
        }
        let rows = session.jobs_status(Some(&[Status::Invalid]), false);
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_external_stop_mid_run() {
        let api = FakeApi::new();
        for id in ["t0", "t1", "t2"] {
            api.on_submit(Operation::Upload, id);
        }
        let session = open_session(&api).await;
        let u0 = session.upload(csv("u0.csv"), Some("u0")).unwrap();
        let u1 = session.upload(csv("u1.csv"), Some("u1")).unwrap();
        let u2 = session.upload(csv("u2.csv"), Some("u2")).unwrap();
        // Every upload is submitted when the batch starts, so the three ids
        // are taken before u1's result is scripted below.
        let finish_u1 = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            let task_id = u1.task().remote_id().unwrap();
            api.script(
                task_id.as_str(),
                vec![json!({"status": "done", "result": {"_id": "d1"}})],
            );
            session.stop_jobs(&[u0.clone(), u2.clone()]).await;
        };

        let (outcome, ()) = tokio::join!(session.run_pending(), finish_u1);
        outcome.unwrap();

        assert_eq!(u0.status(), Status::Fail);
        assert_eq!(u1.status(), Status::Done);
        assert_eq!(u2.status(), Status::Fail);
        assert_eq!(api.cancels().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_aborts_batch() {
        let api = FakeApi::new();
        api.on_submit(Operation::Upload, "t1");
        api.fail_polls();
        let session = open_session(&api).await;
        let upload = session.upload(csv("train.csv"), None).unwrap();

        let err = session.run_pending().await.unwrap_err();

        assert!(matches!(err, ClientError::Transport(_)));
        assert_eq!(upload.status(), Status::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_session_rejects_jobs() {
        let api = FakeApi::new();
        let session = open_session(&api).await;
        session.upload(csv("train.csv"), None).unwrap();

        session.close();

        assert!(session.all_jobs().is_empty());
        assert_eq!(session.pending_count(), 0);
        assert!(matches!(
            session.upload(csv("train.csv"), None),
            Err(ClientError::Configuration(_))
        ));
        assert!(matches!(
            session.run_pending().await,
            Err(ClientError::Configuration(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_queries_and_stop_all() {
        let api = FakeApi::new();
        api.on_submit(Operation::Upload, "t1");
        api.finish("t1", json!({"_id": "d1"}));
        let session = open_session(&api).await;
        let done = session.upload(csv("a.csv"), Some("done")).unwrap();
        session.run_pending().await.unwrap();
        let waiting = session.upload(csv("b.csv"), Some("waiting")).unwrap();

        let found = session.jobs_by_name(&["waiting", "missing"]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name(), "waiting");

        session.stop_all_jobs().await;
        assert_eq!(done.status(), Status::Done);
        assert_eq!(waiting.status(), Status::Fail);

        let rows = session.jobs_status(None, true);
        assert_eq!(
            rows,
            vec![
                ("done".to_string(), Status::Done),
                ("waiting".to_string(), Status::Fail),
            ]
        );
    }
}
