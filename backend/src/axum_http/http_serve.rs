use crate::{
    auth::{AuthState, JwtValidator},
    axum_http::{default_routers, routers},
    config::config_model::DotEnvyConfig,
    usecases::{
        email_scheduling::EmailSchedulingUseCase, grace_periods::GracePeriodUseCase,
        payment_events::PaymentEventUseCase,
    },
};
use anyhow::Result;
use axum::{
    Router,
    http::{
        HeaderName, Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::get,
};
use crates::{
    domain::{
        repositories::profiles::ProfileRepository,
        value_objects::clock::{Clock, SystemClock},
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{
            email_jobs::EmailJobPostgres, payment_transactions::PaymentTransactionPostgres,
            profiles::ProfilePostgres, user_plans::UserPlanPostgres,
        },
    },
    payments::stripe_webhooks::StripeWebhookVerifier,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info};

pub async fn start(config: Arc<DotEnvyConfig>, db_pool: Arc<PgPoolSquad>) -> Result<()> {
    let app = build_router(&config, db_pool)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.backend_server.port));
    let listener = TcpListener::bind(addr).await?;

    info!("Server is running on port {}", config.backend_server.port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

pub fn build_router(config: &DotEnvyConfig, db_pool: Arc<PgPoolSquad>) -> Result<Router> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let plan_repo = Arc::new(UserPlanPostgres::new(Arc::clone(&db_pool)));
    let transaction_repo = Arc::new(PaymentTransactionPostgres::new(Arc::clone(&db_pool)));
    let profile_repo = Arc::new(ProfilePostgres::new(Arc::clone(&db_pool)));
    let job_repo = Arc::new(EmailJobPostgres::new(Arc::clone(&db_pool)));

    let admin_profiles: Arc<dyn ProfileRepository + Send + Sync> = profile_repo.clone();
    let auth = AuthState::new(
        Arc::new(JwtValidator::new(&config.supabase.jwt_secret)),
        admin_profiles,
    );

    let grace_periods = Arc::new(GracePeriodUseCase::new(
        Arc::clone(&plan_repo),
        transaction_repo,
        Arc::clone(&clock),
    ));
    let verifier = config.stripe.webhook_secret.as_ref().map(|secret| {
        StripeWebhookVerifier::new(secret.clone())
            .with_tolerance(config.stripe.signature_tolerance_secs)
    });
    let payment_events = Arc::new(PaymentEventUseCase::new(
        plan_repo,
        Arc::clone(&grace_periods),
        verifier,
        Arc::clone(&clock),
    ));
    let email_scheduling = Arc::new(EmailSchedulingUseCase::new(job_repo, profile_repo, clock));

    let app = Router::new()
        .fallback(default_routers::not_found)
        .nest(
            "/api/v1/grace-period",
            routers::grace_periods::routes(Arc::clone(&grace_periods), auth.clone()),
        )
        .nest(
            "/api/v1/plan",
            routers::grace_periods::plan_routes(grace_periods, auth.clone()),
        )
        .nest(
            "/api/v1/admin/email-queue",
            routers::email_queue::routes(email_scheduling, auth),
        )
        .nest(
            "/api/v1/webhooks",
            routers::payment_webhooks::routes(payment_events),
        )
        .route("/api/v1/health-check", get(default_routers::health_check))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.backend_server.timeout,
        )))
        .layer(RequestBodyLimitLayer::new(
            (config.backend_server.body_limit * 1024 * 1024).try_into()?,
        ))
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([
                    AUTHORIZATION,
                    CONTENT_TYPE,
                    HeaderName::from_static("stripe-signature"),
                ])
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http());

    Ok(app)
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to install CTRL+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM signal handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}
