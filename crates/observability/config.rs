use std::env;

use tracing::Level;
use url::Url;

#[derive(Debug, Clone)]
pub(crate) struct ServiceContext {
    pub(crate) service_name: String,
    pub(crate) environment: String,
    pub(crate) component: String,
}

#[derive(Debug, Clone)]
pub(crate) struct AlertConfig {
    pub(crate) webhook_url: Url,
    pub(crate) min_level: Level,
}

#[derive(Debug, Clone)]
pub(crate) struct ObservabilityConfig {
    pub(crate) service_context: ServiceContext,
    pub(crate) alerts: Option<AlertConfig>,
    /// Logged once the subscriber is installed.
    pub(crate) warnings: Vec<String>,
}

impl ObservabilityConfig {
    pub(crate) fn from_env(component: &str) -> Self {
        Self::from_lookup(component, |key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(component: &str, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let service_context = ServiceContext {
            service_name: non_empty("SERVICE_NAME").unwrap_or_else(|| "bizzin".to_string()),
            environment: non_empty("STAGE").unwrap_or_else(|| "local".to_string()),
            component: component.trim().to_string(),
        };

        let mut warnings = Vec::new();
        let webhook_url = match non_empty("ALERT_WEBHOOK_URL") {
            Some(raw) => match Url::parse(&raw) {
                Ok(url) => Some(url),
                Err(err) => {
                    // The URL embeds a secret, so only the parse error is reported.
                    warnings.push(format!(
                        "ALERT_WEBHOOK_URL is set but invalid; alerts disabled (parse error: {err})"
                    ));
                    None
                }
            },
            None => None,
        };

        let min_level = match non_empty("ALERT_NOTIFY_LEVEL") {
            Some(raw) => parse_level(&raw).unwrap_or_else(|| {
                warnings.push(format!(
                    "ALERT_NOTIFY_LEVEL is invalid (value: {raw}); defaulting to ERROR"
                ));
                Level::ERROR
            }),
            None => Level::ERROR,
        };

        Self {
            service_context,
            alerts: webhook_url.map(|webhook_url| AlertConfig {
                webhook_url,
                min_level,
            }),
            warnings,
        }
    }
}

pub(crate) fn parse_level(input: &str) -> Option<Level> {
    match input.trim().to_ascii_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}
