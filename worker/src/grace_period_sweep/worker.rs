use std::{sync::Arc, time::Duration};

use anyhow::Result;
use backend::usecases::grace_periods::GracePeriodUseCase;
use crates::domain::repositories::{
    payment_transactions::PaymentTransactionRepository, user_plans::UserPlanRepository,
};
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Suspends plans whose grace period has ended, once per `interval`.
pub async fn run<U, T>(
    usecase: Arc<GracePeriodUseCase<U, T>>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()>
where
    U: UserPlanRepository + Send + Sync + 'static,
    T: PaymentTransactionRepository + Send + Sync + 'static,
{
    info!(interval_secs = interval.as_secs(), "grace_period_sweep: starting loop");
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => sweep(&usecase).await,
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!("grace_period_sweep: loop stopped");
    Ok(())
}

async fn sweep<U, T>(usecase: &GracePeriodUseCase<U, T>)
where
    U: UserPlanRepository + Send + Sync + 'static,
    T: PaymentTransactionRepository + Send + Sync + 'static,
{
    match usecase.process_expired_grace_periods().await {
        Ok(result) => {
            if !result.errors.is_empty() {
                warn!(
                    failed = result.errors.len(),
                    "grace_period_sweep: some plans could not be suspended"
                );
            }
            info!(
                processed = result.processed,
                suspended = result.suspended,
                skipped = result.skipped,
                "grace_period_sweep: sweep finished"
            );
        }
        Err(e) => error!(error = %e, "grace_period_sweep: sweep failed"),
    }
}
