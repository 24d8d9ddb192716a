use anyhow::Result;
use backend::{axum_http::http_serve::shutdown_signal, usecases::grace_periods::GracePeriodUseCase};
use crates::{
    domain::{
        repositories::{
            daily_email_contents::DailyEmailContentRepository,
            email_analytics::EmailAnalyticsRepository, email_jobs::EmailJobRepository,
            profiles::ProfileRepository, user_activity::UserActivityRepository,
            worker_statuses::WorkerStatusRepository,
        },
        value_objects::clock::{Clock, SystemClock},
    },
    infra::db::{
        postgres::postgres_connection::{self, PoolSettings},
        repositories::{
            daily_email_contents::DailyEmailContentPostgres, email_analytics::EmailAnalyticsPostgres,
            email_jobs::EmailJobPostgres, payment_transactions::PaymentTransactionPostgres,
            profiles::ProfilePostgres, user_activity::UserActivityPostgres,
            user_plans::UserPlanPostgres, worker_statuses::WorkerStatusPostgres,
        },
    },
    mail::{MailTransport, http_transport::HttpMailTransport, log_transport::LogMailTransport},
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};
use worker::{
    axum_http, config,
    config::config_model::{DotEnvyConfig, MailProvider},
    email_queue, grace_period_sweep,
    usecases::email_queue::{EmailQueueDeps, EmailQueueWorker},
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        error!("Worker exited with error: {:#}", error);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    crates::observability::init_observability("worker")?;

    let dotenvy_env = Arc::new(config::config_loader::load()?);
    info!(stage = %dotenvy_env.stage, "ENV has been loaded");

    let pool_settings = PoolSettings {
        max_size: dotenvy_env.database.max_connections,
        ..Default::default()
    };
    let postgres_pool =
        postgres_connection::establish_connection(&dotenvy_env.database.url, &pool_settings)?;
    info!("Postgres connection has been established");

    let db_pool_arc = Arc::new(postgres_pool);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let job_repository: Arc<dyn EmailJobRepository + Send + Sync> =
        Arc::new(EmailJobPostgres::new(Arc::clone(&db_pool_arc)));
    let status_repository: Arc<dyn WorkerStatusRepository + Send + Sync> =
        Arc::new(WorkerStatusPostgres::new(Arc::clone(&db_pool_arc)));
    let profile_repository: Arc<dyn ProfileRepository + Send + Sync> =
        Arc::new(ProfilePostgres::new(Arc::clone(&db_pool_arc)));
    let activity_repository: Arc<dyn UserActivityRepository + Send + Sync> =
        Arc::new(UserActivityPostgres::new(Arc::clone(&db_pool_arc)));
    let content_repository: Arc<dyn DailyEmailContentRepository + Send + Sync> =
        Arc::new(DailyEmailContentPostgres::new(Arc::clone(&db_pool_arc)));
    let analytics_repository: Arc<dyn EmailAnalyticsRepository + Send + Sync> =
        Arc::new(EmailAnalyticsPostgres::new(Arc::clone(&db_pool_arc)));

    let transport = mail_transport(&dotenvy_env)?;
    info!(transport = transport.transport_name(), "Mail transport has been configured");

    let email_worker = EmailQueueWorker::init(
        EmailQueueDeps {
            job_repo: job_repository,
            status_repo: status_repository,
            profile_repo: profile_repository,
            activity_repo: activity_repository,
            content_repo: content_repository,
            analytics_repo: analytics_repository,
            transport,
            clock: Arc::clone(&clock),
        },
        dotenvy_env.email_queue.clone(),
    )
    .await?;

    let grace_periods = Arc::new(GracePeriodUseCase::new(
        Arc::new(UserPlanPostgres::new(Arc::clone(&db_pool_arc))),
        Arc::new(PaymentTransactionPostgres::new(Arc::clone(&db_pool_arc))),
        clock,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let email_queue_loop = tokio::spawn(email_queue::worker::run(
        Arc::clone(&email_worker),
        dotenvy_env.email_queue.poll_interval,
        shutdown_rx.clone(),
    ));

    let grace_sweep_loop = match dotenvy_env.grace_sweep.interval {
        Some(interval) => Some(tokio::spawn(grace_period_sweep::worker::run(
            Arc::clone(&grace_periods),
            interval,
            shutdown_rx.clone(),
        ))),
        None => {
            info!("Grace period sweep loop is disabled");
            None
        }
    };

    let server_config = Arc::clone(&dotenvy_env);
    let server_worker = Arc::clone(&email_worker);
    let mut internal_server = tokio::spawn(axum_http::http_serve::start(
        server_config,
        server_worker,
        grace_periods,
        shutdown_rx,
    ));

    let server_exited = tokio::select! {
        _ = shutdown_signal() => None,
        result = &mut internal_server => Some(result),
    };
    info!("Shutdown requested, draining worker");
    shutdown_tx.send(true).ok();

    email_queue_loop.await??;
    if let Some(loop_handle) = grace_sweep_loop {
        loop_handle.await??;
    }
    match server_exited {
        Some(result) => result??,
        None => internal_server.await??,
    }

    info!("Worker stopped");
    Ok(())
}

fn mail_transport(config: &DotEnvyConfig) -> Result<Arc<dyn MailTransport + Send + Sync>> {
    let transport: Arc<dyn MailTransport + Send + Sync> = match &config.mail.provider {
        MailProvider::Log => Arc::new(LogMailTransport),
        MailProvider::Http {
            endpoint,
            api_key,
            from_address,
        } => Arc::new(HttpMailTransport::new(
            endpoint.clone(),
            api_key.clone(),
            from_address.clone(),
            config.mail.request_timeout,
        )?),
    };
    Ok(transport)
}
