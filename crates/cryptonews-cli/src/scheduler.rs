//! Long-running ingestion loop.
//!
//! Every configured source is queued once at startup and then again on each
//! tick of a [`JobScheduler`] repeating every `FETCH_INTERVAL_SECONDS`. Jobs
//! queued by the scheduler carry no explicit start time, so each source
//! resumes from its watermark.

use std::sync::Arc;
use std::time::Duration;

use cryptonews_pipeline::WorkerPool;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Run until Ctrl-C (or SIGTERM), then shut down the scheduler and drain the
/// worker pool.
///
/// # Errors
///
/// Returns an error if the worker pool or the scheduler cannot be started,
/// or the scheduler fails to shut down.
pub(crate) async fn run_scheduler(
    pool: &sqlx::PgPool,
    config: &cryptonews_core::AppConfig,
) -> anyhow::Result<()> {
    let workers = crate::start_worker_pool(pool, config).await?;
    let interval = Duration::from_secs(config.fetch_interval_seconds);

    let queued = enqueue_all(&workers);
    tracing::info!(count = queued, "scheduler: queued initial fetch jobs");

    let mut scheduler = build_scheduler(Arc::clone(&workers), interval).await?;
    tracing::info!(
        interval_secs = config.fetch_interval_seconds,
        "scheduler: running, press Ctrl-C to stop"
    );

    shutdown_signal().await;

    scheduler.shutdown().await?;
    workers.stop().await;
    tracing::info!("scheduler: stopped");
    Ok(())
}

fn enqueue_all(workers: &WorkerPool) -> usize {
    workers
        .source_names()
        .into_iter()
        .filter(|name| workers.enqueue(name, None))
        .count()
}

/// Register the repeating fetch job and start the scheduler. The returned
/// handle must be kept alive for the jobs to keep firing.
async fn build_scheduler(
    workers: Arc<WorkerPool>,
    interval: Duration,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_repeated_async(interval, move |_uuid, _lock| {
        let workers = Arc::clone(&workers);
        Box::pin(async move {
            let queued = enqueue_all(&workers);
            tracing::info!(count = queued, "scheduler: queued fetch jobs");
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;
    Ok(scheduler)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
