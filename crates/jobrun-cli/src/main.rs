//! jobrun CLI - upload, train and predict against the remote service.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use jobrun_client::{ClientConfig, CoreApi, HttpClient};
use jobrun_core::{Algorithm, Evaluator, RemoteId, Status};
use jobrun_runtime::{Intervals, Job, PredictInput, Session, TrainInput, UploadInput};

/// Environment variable holding the log filter.
const LOG_ENV: &str = "JOBRUN_LOG";

/// jobrun CLI - Job scheduler for the training/prediction service
#[derive(Parser)]
#[command(name = "jobrun")]
#[command(about = "Run dependent upload/train/predict jobs", long_about = None)]
struct Cli {
    /// Service endpoint (overrides JOBRUN_ENDPOINT)
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Basic-auth user name (overrides JOBRUN_USERNAME)
    #[arg(short, long)]
    username: Option<String>,

    /// Basic-auth password (overrides JOBRUN_PASSWORD)
    #[arg(short, long)]
    password: Option<String>,

    /// Seconds between task polls
    #[arg(long)]
    poll_secs: Option<u64>,

    /// Seconds between prerequisite checks
    #[arg(long)]
    wait_secs: Option<u64>,

    /// Stop any job still running after this many seconds
    #[arg(long)]
    deadline_secs: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct TrainArgs {
    /// Target column
    #[arg(short, long)]
    target: String,

    /// Algorithms to train (repeatable)
    #[arg(short, long = "algo", required = true)]
    algos: Vec<Algorithm>,

    /// Metric used to pick the best model
    #[arg(long, default_value = "auto")]
    evaluator: Evaluator,

    /// Maximum number of models
    #[arg(long)]
    max_model: Option<u32>,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a CSV file
    Upload {
        /// CSV file to upload
        file: PathBuf,

        /// Job name
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Train models on a CSV file
    Train {
        /// Training data
        file: PathBuf,

        #[command(flatten)]
        train: TrainArgs,

        /// Write the best model archive here
        #[arg(long)]
        model_output: Option<PathBuf>,
    },

    /// Upload train and test data, train, then predict the test data
    Pipeline {
        /// Training data
        #[arg(long)]
        train_file: PathBuf,

        /// Data to predict
        #[arg(long)]
        test_file: PathBuf,

        #[command(flatten)]
        train: TrainArgs,

        /// Binary classification threshold
        #[arg(long)]
        threshold: Option<f64>,

        /// Write predictions here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Predict with an existing experiment's best model
    Predict {
        /// Data to predict
        file: PathBuf,

        /// Experiment id
        #[arg(long)]
        experiment: String,

        /// Metric used to pick the best model
        #[arg(long, default_value = "auto")]
        evaluator: Evaluator,

        /// The experiment is a time series forecast
        #[arg(long)]
        time_series: bool,

        /// Write predictions here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the raw state of a remote task
    Task {
        /// Task ID
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    let mut config = ClientConfig::from_env();
    if let Some(endpoint) = cli.endpoint {
        config.endpoint = endpoint;
    }
    if cli.username.is_some() {
        config.username = cli.username;
    }
    if cli.password.is_some() {
        config.password = cli.password;
    }

    let mut intervals = Intervals::default();
    if let Some(secs) = cli.poll_secs {
        intervals.poll = Duration::from_secs(secs);
    }
    if let Some(secs) = cli.wait_secs {
        intervals.wait = Duration::from_secs(secs);
    }
    if let Some(secs) = cli.deadline_secs {
        intervals.deadline = Some(Duration::from_secs(secs));
    }

    let api = Arc::new(HttpClient::new(&config)?);

    if let Commands::Task { id } = &cli.command {
        return show_task(api.as_ref(), id).await;
    }

    let session = Session::with_api(api, config)
        .with_intervals(intervals)
        .open()
        .await?;

    let outcome = match cli.command {
        Commands::Upload { file, name } => upload(&session, &file, name.as_deref()).await,
        Commands::Train {
            file,
            train,
            model_output,
        } => train_models(&session, &file, train, model_output.as_deref()).await,
        Commands::Pipeline {
            train_file,
            test_file,
            train,
            threshold,
            output,
        } => {
            pipeline(
                &session,
                &train_file,
                &test_file,
                train,
                threshold,
                output.as_deref(),
            )
            .await
        }
        Commands::Predict {
            file,
            experiment,
            evaluator,
            time_series,
            output,
        } => {
            predict(
                &session,
                &file,
                &experiment,
                evaluator,
                time_series,
                output.as_deref(),
            )
            .await
        }
        Commands::Task { .. } => Ok(()),
    };

    print_jobs(&session);
    session.close();
    outcome
}

async fn upload(
    session: &Session,
    file: &Path,
    name: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = session.upload(UploadInput::from_path(file).await?, name)?;
    session.run_pending().await?;

    ensure_success(&data)?;
    println!("Uploaded {} as data {}", file.display(), display_id(data.id()));
    Ok(())
}

async fn train_models(
    session: &Session,
    file: &Path,
    args: TrainArgs,
    model_output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = session.upload(UploadInput::from_path(file).await?, None)?;
    let experiment = session.train(train_input(&data, &args), args.evaluator, None)?;
    session.run_pending().await?;

    ensure_success(&experiment)?;
    println!("Experiment {}", display_id(experiment.id()));
    if let Some(best) = experiment.best_model() {
        println!("  Best model: {} ({} = {})", best.model_id, best.metric, best.score);
    }

    if let Some(path) = model_output {
        let archive = experiment.best_model_download().await?;
        tokio::fs::write(path, archive).await?;
        info!(path = %path.display(), "Best model written");
    }
    Ok(())
}

async fn pipeline(
    session: &Session,
    train_file: &Path,
    test_file: &Path,
    args: TrainArgs,
    threshold: Option<f64>,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let train_data = session.upload(UploadInput::from_path(train_file).await?, Some("train_data"))?;
    let test_data = session.upload(UploadInput::from_path(test_file).await?, Some("test_data"))?;
    let experiment = session.train(
        train_input(&train_data, &args),
        args.evaluator,
        Some("experiment"),
    )?;

    let mut input = PredictInput::new(&test_data, &experiment);
    if let Some(threshold) = threshold {
        input = input.with_threshold(threshold);
    }
    let prediction = session.predict(input, Some("prediction"))?;

    session.run_pending().await?;

    ensure_success(&prediction)?;
    write_output(&prediction, output).await
}

async fn predict(
    session: &Session,
    file: &Path,
    experiment_id: &str,
    evaluator: Evaluator,
    time_series: bool,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let experiment = if time_series {
        session.attach_experiment_ts(experiment_id, evaluator, None).await?
    } else {
        session.attach_experiment(experiment_id, evaluator, None).await?
    };
    let data = session.upload(UploadInput::from_path(file).await?, None)?;
    let input = PredictInput::new(&data, &experiment);
    let prediction = if time_series {
        session.predict_ts(input, None)?
    } else {
        session.predict(input, None)?
    };
    session.run_pending().await?;

    ensure_success(&prediction)?;
    write_output(&prediction, output).await
}

async fn show_task(api: &dyn CoreApi, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let task = api.poll(&RemoteId::new(id)).await?;
    println!("{}", serde_json::to_string_pretty(&task)?);
    Ok(())
}

fn train_input(data: &Job, args: &TrainArgs) -> TrainInput {
    let mut input = TrainInput::new(data, args.target.clone(), args.algos.clone());
    if args.evaluator != Evaluator::Auto {
        input = input.with_evaluator(args.evaluator);
    }
    if let Some(max_model) = args.max_model {
        input = input.with_max_model(max_model);
    }
    input
}

async fn write_output(job: &Job, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match output {
        Some(path) => {
            tokio::fs::write(path, job.download().await?).await?;
            info!(path = %path.display(), "Predictions written");
        }
        None => print!("{}", job.show().await?),
    }
    Ok(())
}

fn ensure_success(job: &Job) -> Result<(), Box<dyn std::error::Error>> {
    if job.is_success() {
        return Ok(());
    }
    let report = job.prerequisite_report();
    if report.is_empty() {
        Err(format!("{} ended with status {}", job.name(), job.status()).into())
    } else {
        let causes: Vec<String> = report
            .iter()
            .map(|(name, status)| format!("{}={}", name, status))
            .collect();
        Err(format!("{} failed: prerequisites {}", job.name(), causes.join(", ")).into())
    }
}

fn print_jobs(session: &Session) {
    let jobs = session.all_jobs();
    if jobs.is_empty() {
        return;
    }

    eprintln!("{:<28}  {:<8}  {:<24}  {}", "JOB", "STATUS", "ID", "FINISHED");
    eprintln!("{}", "-".repeat(80));
    for job in jobs {
        let finished = job
            .finished_at()
            .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        eprintln!(
            "{:<28}  {:<8}  {:<24}  {}",
            job.name(),
            status_label(job.status()),
            display_id(job.id()),
            finished
        );
    }
}

fn status_label(status: Status) -> &'static str {
    match status {
        Status::Pending => "PENDING",
        Status::Running => "RUNNING",
        Status::Done => "DONE",
        Status::Fail => "FAIL",
        Status::Invalid => "INVALID",
    }
}

fn display_id(id: Option<RemoteId>) -> String {
    id.map(RemoteId::into_inner).unwrap_or_else(|| "-".to_string())
}
