//! `cronscript-worker` -- runs scheduled scripts in embedded sessions.
//!
//! Loads the jobs file, opens one execution host per enabled job and
//! triggers each job on its interval until SIGINT/SIGTERM.
//!
//! # Environment variables
//!
//! | Variable                 | Required | Default     | Description                              |
//! |--------------------------|----------|-------------|------------------------------------------|
//! | `JOBS_FILE`              | no       | `jobs.json` | JSON file listing the jobs               |
//! | `SCRIPT_BASE_DIR`        | no       | jobs dir    | Base for relative script paths           |
//! | `SHUTDOWN_TIMEOUT_SECS`  | no       | `30`        | Grace period for running scripts         |
//! | `SCRIPT_VERBOSE`         | no       | `true`      | Log verbose lines and progress timelines |
//! | `SCRIPT_FAIL_ON_ERROR`   | no       | `true`      | Report script errors as failed runs      |
//! | `SCRIPT_MAX_OPERATIONS`  | no       | `0`         | Per-run operation budget (0 = unlimited) |
//! | `SCRIPT_MAX_CALL_LEVELS` | no       | `64`        | Maximum function call depth              |
//! | `SCRIPT_PROFILE`         | no       | --          | Script evaluated once per session        |

use std::sync::Arc;

use cronscript_events::EventBus;
use cronscript_host::TracingLog;
use cronscript_worker::{log_job_events, JobScheduler, WorkerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cronscript_worker=info,cronscript_host=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env();
    tracing::info!(
        jobs_file = %config.jobs_file.display(),
        base_dir = %config.base_dir().display(),
        shutdown_timeout_secs = config.shutdown_timeout.as_secs(),
        "Starting cronscript-worker",
    );

    let jobs = match config.load_jobs() {
        Ok(jobs) => jobs,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load jobs");
            std::process::exit(1);
        }
    };

    let bus = Arc::new(EventBus::default());
    // Subscribe before any job starts so no early event is missed.
    let events_handle = tokio::spawn(log_job_events(bus.subscribe()));

    let mut scheduler = JobScheduler::new();
    let started = scheduler.schedule_all(jobs, &config, Arc::new(TracingLog), bus.clone());
    tracing::info!(started, "Jobs scheduled");

    shutdown_signal().await;

    scheduler.shutdown(config.shutdown_timeout).await;
    tracing::info!("Job loops stopped");

    // Dropping the last bus handle closes the channel and ends the event logger.
    drop(bus);
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), events_handle).await;

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT (Ctrl-C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
