//! Process entry point: loads config, wires the Source/Sink clients, the
//! SQLite store and job queue, starts the worker pool that drains the
//! queue in the background, and serves the HTTP surface. The periodic
//! sweep and the ID-migration procedure are not run from here -- they
//! are invoked externally (`POST /reconcile` from a cron, `migrate` as a
//! one-off binary), matching the original service's Cloud Run
//! request/job split.

use std::sync::Arc;
use std::time::Duration;

use backend::{build_clients, default_database_url};
use db::Store;
use queue::{Job, JobQueue, SqliteJobQueue};
use server::AppState;
use sink_client::SinkClient;
use source_client::SourceClient;
use tracing_subscriber::EnvFilter;
use utils::config::Settings;
use utils::retry::RetryPolicy;
use worker::Worker;

/// Number of tasks concurrently draining the job queue. The queue itself
/// serializes per `source_task_id` (`in_flight_keys`), so raising this
/// only buys throughput across distinct tasks, never within one.
const WORKER_POOL_SIZE: usize = 4;

/// How long an idle poller sleeps before re-checking the queue.
const POLL_IDLE_INTERVAL: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&settings.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let database_url = default_database_url();
    let (source, sink, store) = build_clients(&settings, &database_url).await?;

    let retry_policy = RetryPolicy::new(settings.max_retries, settings.retry_multiplier_seconds);
    let job_queue: Arc<dyn JobQueue> =
        Arc::new(SqliteJobQueue::new(store.pool().clone(), retry_policy));

    for worker_id in 0..WORKER_POOL_SIZE {
        let source = source.clone();
        let sink = sink.clone();
        let store: Arc<dyn Store> = store.clone();
        let job_queue = job_queue.clone();
        let settings = settings.clone();
        tokio::spawn(async move {
            poll_loop(worker_id, source, sink, store, job_queue, settings).await;
        });
    }

    let state = AppState::new(source, sink, store, job_queue, settings.clone());
    let app = server::app(state);

    tracing::info!(addr = %settings.bind_addr, "starting capsync server");
    let listener = tokio::net::TcpListener::bind(&settings.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// One worker pool slot: claim, process, settle, repeat. Sleeps when the
/// queue has nothing claimable so idle pollers don't spin.
async fn poll_loop(
    worker_id: usize,
    source: Arc<dyn SourceClient>,
    sink: Arc<dyn SinkClient>,
    store: Arc<dyn Store>,
    job_queue: Arc<dyn JobQueue>,
    settings: Settings,
) {
    loop {
        let job = match job_queue.claim_next().await {
            Ok(Some(job)) => job,
            Ok(None) => {
                tokio::time::sleep(POLL_IDLE_INTERVAL).await;
                continue;
            }
            Err(err) => {
                tracing::error!(worker_id, error = %err, "failed to claim next job");
                tokio::time::sleep(POLL_IDLE_INTERVAL).await;
                continue;
            }
        };

        settle(worker_id, &job, &source, &sink, &store, &job_queue, &settings).await;
    }
}

async fn settle(
    worker_id: usize,
    job: &Job,
    source: &Arc<dyn SourceClient>,
    sink: &Arc<dyn SinkClient>,
    store: &Arc<dyn Store>,
    job_queue: &Arc<dyn JobQueue>,
    settings: &Settings,
) {
    let worker =
        Worker { source: source.as_ref(), sink: sink.as_ref(), store: store.as_ref(), settings };
    let result = worker.process_job(job, db::SyncOrigin::Event).await;

    let outcome = match result {
        Ok(()) => job_queue.complete(job).await,
        Err(err) => {
            let retryable = err.is_retryable() && job.attempts < settings.max_retries;
            tracing::warn!(
                worker_id,
                source_task_id = %job.source_task_id,
                attempts = job.attempts,
                retryable,
                error = %err,
                "job processing failed"
            );
            job_queue.fail(job, retryable).await
        }
    };

    if let Err(err) = outcome {
        tracing::error!(worker_id, error = %err, "failed to settle job outcome");
    }
}
