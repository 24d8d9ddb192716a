use std::{sync::Arc, time::Duration};

use anyhow::Result;
use tokio::sync::watch;
use tracing::{error, info};

use crate::usecases::email_queue::EmailQueueWorker;

/// Polls the queue every `poll_interval` until `shutdown` flips, then drains the
/// in-flight cycle and marks the worker stopped.
pub async fn run(
    worker: Arc<EmailQueueWorker>,
    poll_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    info!(worker_id = %worker.worker_id(), "email_queue: starting poll loop");
    let mut ticker = tokio::time::interval(poll_interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = worker.process_queued_jobs().await {
                    error!(error = %e, "email_queue: poll cycle failed");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!(worker_id = %worker.worker_id(), "email_queue: shutting down poll loop");
    worker.shutdown().await
}
