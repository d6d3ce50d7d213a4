use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::Parser;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

use retrylab::cli::{Cli, Command};
use retrylab::config::RetrylabConfig;
use retrylab::dispatcher::{Dispatcher, DispatcherConfig};
use retrylab::error::RetrylabError;
use retrylab::store::{InMemoryStore, JobStore};
use retrylab::ui::QueueProgress;

/// Job definition accepted in `--file` submissions and built by the
/// inline `run` form.
#[derive(Debug, Deserialize)]
struct JobSpec {
    #[serde(rename = "type")]
    job_type: String,
    #[serde(default = "empty_payload")]
    payload: Value,
    #[serde(default)]
    max_attempts: Option<u32>,
}

fn empty_payload() -> Value {
    json!({})
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = RetrylabConfig::load()?;
    let workers = cli.workers.unwrap_or(config.workers);
    let default_max_attempts = cli.max_attempts.unwrap_or(config.default_max_attempts);

    let specs = match cli.command {
        Command::Run {
            job_type,
            payload,
            file,
        } => collect_specs(job_type, payload, file)?,
        Command::Demo => demo_specs(),
    };

    let store = Arc::new(InMemoryStore::new());
    for spec in &specs {
        store.create(
            &spec.job_type,
            spec.payload.clone(),
            spec.max_attempts.unwrap_or(default_max_attempts),
        )?;
    }

    let dispatcher = Dispatcher::new(
        store.clone(),
        DispatcherConfig {
            workers,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        },
    );
    let handles = dispatcher.spawn();

    // Poll the listing until every submitted job is terminal, the same way
    // a dashboard client would.
    let progress = QueueProgress::start(specs.len());
    loop {
        let jobs = store.list();
        let terminal = jobs.iter().filter(|j| j.status.is_terminal()).count();
        progress.update(terminal, jobs.len());
        if terminal == jobs.len() {
            progress.finish(&jobs);
            break;
        }
        sleep(Duration::from_millis(50)).await;
    }

    dispatcher.shutdown();
    for handle in handles {
        let _ = handle.await;
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "retrylab=debug"
    } else {
        "retrylab=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Resolve the `run` inputs into job specs: either a file of definitions
/// or a single inline type + payload.
fn collect_specs(
    job_type: Option<String>,
    payload: Option<String>,
    file: Option<String>,
) -> Result<Vec<JobSpec>> {
    if let Some(path) = file {
        let specs = load_job_file(Path::new(&path))?;
        if specs.is_empty() {
            bail!("job file {path} contains no job definitions");
        }
        return Ok(specs);
    }

    let Some(job_type) = job_type else {
        bail!("run requires a job type or --file");
    };
    let payload = match payload {
        Some(raw) => serde_json::from_str(&raw)?,
        None => json!({}),
    };
    Ok(vec![JobSpec {
        job_type,
        payload,
        max_attempts: None,
    }])
}

/// Load a JSON array of `{type, payload?, max_attempts?}` definitions.
fn load_job_file(path: &Path) -> Result<Vec<JobSpec>, RetrylabError> {
    let contents = std::fs::read_to_string(path)?;
    let specs: Vec<JobSpec> = serde_json::from_str(&contents)?;
    Ok(specs)
}

/// The built-in demo batch: one job per simulation mode.
fn demo_specs() -> Vec<JobSpec> {
    vec![
        JobSpec {
            job_type: "send-email".into(),
            payload: json!({"force": "success"}),
            max_attempts: Some(3),
        },
        JobSpec {
            job_type: "send-email".into(),
            payload: json!({"force": "fail"}),
            max_attempts: Some(2),
        },
        JobSpec {
            job_type: "resize-image".into(),
            payload: json!({"fail_times": 2}),
            max_attempts: Some(5),
        },
        JobSpec {
            job_type: "sync-crm".into(),
            payload: json!({"fail_times": 5}),
            max_attempts: Some(3),
        },
        JobSpec {
            job_type: "charge-card".into(),
            payload: json!({}),
            max_attempts: Some(3),
        },
        JobSpec {
            job_type: "charge-card".into(),
            payload: json!({}),
            max_attempts: Some(1),
        },
    ]
}
