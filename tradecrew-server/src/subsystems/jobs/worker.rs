//! In-process queue consumer.
//!
//! One task, one job at a time: each tick drains every due job sequentially, then
//! sleeps until the next poll.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tradecrew_core::config::QueueConfig;

use super::{JobService, ProcessOutcome};

/// Called from main.rs when the worker is enabled outside production.
pub async fn run_worker(
    service: Arc<JobService>,
    config: QueueConfig,
    mut shutdown: broadcast::Receiver<()>,
) {
    if !service.queue().is_available() {
        tracing::info!("Job worker not started: queue unavailable");
        return;
    }

    let mut ticker = interval(Duration::from_millis(config.poll_interval_ms.max(10)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(poll_interval_ms = config.poll_interval_ms, "Job worker started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match run_worker_tick(&service).await {
                    Ok(0) => {}
                    Ok(processed) => tracing::debug!(processed, "Worker tick complete"),
                    Err(e) => tracing::warn!(error = %e, "Worker tick failed"),
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("Job worker shutting down");
                break;
            }
        }
    }
}

/// Process due jobs until the queue has none left. Returns how many were processed.
pub async fn run_worker_tick(service: &JobService) -> anyhow::Result<usize> {
    let Some(backend) = service.queue().backend() else {
        return Ok(0);
    };

    let mut processed = 0usize;
    while let Some(job) = backend.dequeue().await? {
        let queue_id = job.id;
        match service.process_queue_job(job).await {
            Ok(ProcessOutcome::Retrying) => {
                processed += 1;
                // Retried jobs are due again after their backoff; leave them for a later tick.
                break;
            }
            Ok(_) => processed += 1,
            Err(e) => {
                tracing::error!(queue_id, error = %e, "Failed to record job outcome");
                processed += 1;
            }
        }
    }

    Ok(processed)
}
