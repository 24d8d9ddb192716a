use crate::{
    axum_http::{default_routers, routers},
    config::config_model::DotEnvyConfig,
    usecases::email_queue::EmailQueueWorker,
};
use anyhow::Result;
use axum::{
    Router,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::get,
};
use backend::usecases::grace_periods::GracePeriodUseCase;
use crates::domain::repositories::{
    payment_transactions::PaymentTransactionRepository, user_plans::UserPlanRepository,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::{net::TcpListener, sync::watch};
use tower_http::{
    cors::CorsLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use tracing::info;

pub async fn start<U, T>(
    config: Arc<DotEnvyConfig>,
    email_worker: Arc<EmailQueueWorker>,
    grace_periods: Arc<GracePeriodUseCase<U, T>>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()>
where
    U: UserPlanRepository + Send + Sync + 'static,
    T: PaymentTransactionRepository + Send + Sync + 'static,
{
    let app = build_router(&config, email_worker, grace_periods)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.worker_server.port));
    let listener = TcpListener::bind(addr).await?;
    info!("Worker HTTP server running on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            while !*shutdown.borrow() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
        })
        .await?;
    Ok(())
}

pub fn build_router<U, T>(
    config: &DotEnvyConfig,
    email_worker: Arc<EmailQueueWorker>,
    grace_periods: Arc<GracePeriodUseCase<U, T>>,
) -> Result<Router>
where
    U: UserPlanRepository + Send + Sync + 'static,
    T: PaymentTransactionRepository + Send + Sync + 'static,
{
    let allowed_origins = vec![
        "http://localhost".parse()?,
        "http://127.0.0.1".parse()?,
        "http://localhost:3000".parse()?,
        "http://127.0.0.1:3000".parse()?,
    ];
    let trigger_token = config.internal.trigger_token.clone();

    let app = Router::new()
        .fallback(default_routers::not_found)
        .nest(
            "/internal/v1/email-queue",
            routers::email_queue::routes(trigger_token.clone(), email_worker),
        )
        .nest(
            "/internal/v1/grace-period",
            routers::grace_periods::routes(trigger_token, grace_periods),
        )
        .route("/health-check", get(default_routers::health_check))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.worker_server.timeout,
        )))
        .layer(RequestBodyLimitLayer::new(
            (config.worker_server.body_limit * 1024 * 1024).try_into()?,
        ))
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([AUTHORIZATION, CONTENT_TYPE])
                .allow_origin(allowed_origins),
        )
        .layer(TraceLayer::new_for_http());

    Ok(app)
}
