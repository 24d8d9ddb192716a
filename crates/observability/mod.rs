mod alert_layer;
mod alert_sink;
mod config;

use std::sync::Arc;

use alert_layer::AlertLayer;
use alert_sink::{AlertDispatcher, ChatWebhookSink};
use anyhow::Result;
use config::ObservabilityConfig;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Installs the global subscriber for a binary. Must run inside a tokio runtime when
/// `ALERT_WEBHOOK_URL` is set, since alert delivery runs on a spawned task.
pub fn init_observability(component: &str) -> Result<()> {
    let config = ObservabilityConfig::from_env(component);
    let mut warnings = config.warnings.clone();

    let alert_layer = match config.alerts.as_ref() {
        Some(alerts) => match ChatWebhookSink::new(alerts.webhook_url.clone()) {
            Ok(sink) => {
                let dispatcher = AlertDispatcher::spawn(vec![Arc::new(sink)]);
                Some(
                    AlertLayer::new(dispatcher, config.service_context.clone(), alerts.min_level)
                        .with_filter(LevelFilter::from_level(alerts.min_level)),
                )
            }
            Err(err) => {
                warnings.push(format!("alert sink disabled: {err}"));
                None
            }
        },
        None => None,
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Local time so `TZ` shows up in log timestamps.
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339());

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(alert_layer)
        .with(env_filter)
        .try_init()?;

    let context = &config.service_context;
    for warning in &warnings {
        warn!(
            service = %context.service_name,
            environment = %context.environment,
            component = %context.component,
            warning = %warning,
            "observability: config warning"
        );
    }

    info!(
        service = %context.service_name,
        environment = %context.environment,
        component = %context.component,
        alerts_enabled = config.alerts.is_some(),
        "observability: tracing initialised"
    );

    Ok(())
}
