use clap::{ArgGroup, Parser, Subcommand};
use formspool::FeedbackRecord;
use formspool_client::{
    ClientConfig, Connectivity, FileStore, FlushReport, Flusher, HttpTransport, SubmissionQueue,
};
use formspool_http::{serve, ServerConfig};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "formspool", version, about = "Feedback submission endpoint and queue")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[arg(long, env = "FORMSPOOL_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,
    #[arg(long, env = "FORMSPOOL_BIND_ADDR", default_value = "127.0.0.1:7700")]
    bind_addr: String,
    #[arg(long, env = "FORMSPOOL_SHEET_NAME", default_value = formspool::schema::DEFAULT_SHEET_NAME)]
    sheet_name: String,
    #[arg(
        long,
        env = "FORMSPOOL_LOCK_WAIT_MS",
        default_value_t = 10_000,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    lock_wait_ms: u64,
    #[arg(long, env = "FORMSPOOL_MAX_BODY_KB", default_value_t = 64)]
    max_body_kb: usize,
}

#[derive(Subcommand)]
enum Command {
    /// Run the append endpoint (the default)
    Serve,
    /// Validate a record, queue it locally and try to deliver it
    #[command(group(ArgGroup::new("input").required(true).args(["json", "file"])))]
    Submit {
        #[arg(long, env = "FORMSPOOL_QUEUE_DIR", default_value = "./queue")]
        queue_dir: PathBuf,
        #[arg(long)]
        endpoint: Option<String>,
        /// Record as an inline JSON object
        #[arg(long)]
        json: Option<String>,
        /// Path to a file holding the record as a JSON object
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Deliver everything still queued
    Flush {
        #[arg(long, env = "FORMSPOOL_QUEUE_DIR", default_value = "./queue")]
        queue_dir: PathBuf,
        #[arg(long)]
        endpoint: Option<String>,
    },
    /// Print queued records
    Queue {
        #[arg(long, env = "FORMSPOOL_QUEUE_DIR", default_value = "./queue")]
        queue_dir: PathBuf,
    },
}

#[derive(Serialize)]
struct SubmitOutput {
    queued_at: Option<String>,
    #[serde(flatten)]
    report: FlushReport,
}

type BoxError = Box<dyn std::error::Error>;

/// Client subcommands print JSON on stdout, so their logs go to stderr.
fn init_cli_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .try_init();
}

fn open_queue(queue_dir: &Path, config: &ClientConfig) -> Result<Arc<SubmissionQueue>, BoxError> {
    let store = FileStore::open(queue_dir)?;
    Ok(Arc::new(SubmissionQueue::new(
        Arc::new(store),
        config.queue_key.clone(),
    )))
}

/// Queue, transport and a connectivity flag seeded by probing the endpoint.
async fn open_client(
    queue_dir: &Path,
    endpoint: Option<String>,
) -> Result<Arc<Flusher<HttpTransport>>, BoxError> {
    let mut config = ClientConfig::load_or_default(queue_dir);
    if endpoint.is_some() {
        config.endpoint = endpoint;
    }
    let queue = open_queue(queue_dir, &config)?;
    let transport = config.transport()?;

    let online = match transport.probe().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("{} unreachable, working offline: {}", transport.endpoint(), e);
            false
        }
    };

    Ok(Flusher::new(
        queue,
        Arc::new(transport),
        config.retry_policy(),
        Connectivity::new(online),
    ))
}

fn read_record(json: Option<String>, file: Option<PathBuf>) -> Result<FeedbackRecord, BoxError> {
    let raw = match (json, file) {
        (Some(json), _) => json,
        (None, Some(path)) => std::fs::read_to_string(path)?,
        (None, None) => return Err("one of --json or --file is required".into()),
    };
    let value: serde_json::Value = serde_json::from_str(&raw)?;
    Ok(FeedbackRecord::from_json(&value)?)
}

async fn run_submit(
    queue_dir: PathBuf,
    endpoint: Option<String>,
    json: Option<String>,
    file: Option<PathBuf>,
) -> Result<(), BoxError> {
    let mut record = read_record(json, file)?;

    let problems = record.validate();
    if !problems.is_empty() {
        for problem in &problems {
            eprintln!("{}", problem);
        }
        std::process::exit(2);
    }
    record.stamp_submitted(chrono::Utc::now());

    let flusher = open_client(&queue_dir, endpoint).await?;
    let submission = flusher.submit(record);
    let report = submission.delivery.await?;

    let output = SubmitOutput {
        queued_at: submission.queued_at,
        report,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn run_flush(queue_dir: PathBuf, endpoint: Option<String>) -> Result<(), BoxError> {
    let flusher = open_client(&queue_dir, endpoint).await?;
    let report = flusher.flush().await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_queue(queue_dir: PathBuf) -> Result<(), BoxError> {
    let config = ClientConfig::load_or_default(&queue_dir);
    let queue = open_queue(&queue_dir, &config)?;
    println!("{}", serde_json::to_string_pretty(&queue.pending())?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => {
            let config = ServerConfig {
                data_dir: cli.data_dir,
                bind_addr: cli.bind_addr,
                sheet_name: cli.sheet_name,
                lock_wait_ms: cli.lock_wait_ms,
                max_body_kb: cli.max_body_kb,
            };
            serve(config).await
        }
        Some(Command::Submit {
            queue_dir,
            endpoint,
            json,
            file,
        }) => {
            init_cli_tracing();
            run_submit(queue_dir, endpoint, json, file).await
        }
        Some(Command::Flush {
            queue_dir,
            endpoint,
        }) => {
            init_cli_tracing();
            run_flush(queue_dir, endpoint).await
        }
        Some(Command::Queue { queue_dir }) => {
            init_cli_tracing();
            run_queue(queue_dir)
        }
    }
}
