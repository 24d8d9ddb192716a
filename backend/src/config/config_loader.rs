use anyhow::{Context, Result};
use crates::payments::stripe_webhooks::DEFAULT_TOLERANCE_SECS;

use super::{
    config_model::{BackendServer, Database, DotEnvyConfig, Stripe, Supabase},
    stage::Stage,
};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let backend_server = BackendServer {
        port: required("SERVER_PORT_BACKEND")?
            .parse()
            .context("SERVER_PORT_BACKEND is invalid")?,
        body_limit: optional("SERVER_BODY_LIMIT")
            .unwrap_or_else(|| "10".to_string())
            .parse()
            .context("SERVER_BODY_LIMIT is invalid")?,
        timeout: optional("SERVER_TIMEOUT")
            .unwrap_or_else(|| "30".to_string())
            .parse()
            .context("SERVER_TIMEOUT is invalid")?,
    };

    let database = Database {
        url: required("DATABASE_URL")?,
        max_connections: optional("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|| "10".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS is invalid")?,
    };

    let supabase = Supabase {
        jwt_secret: required("SUPABASE_JWT_SECRET")?,
    };

    let stripe = Stripe {
        webhook_secret: optional("STRIPE_WEBHOOK_SECRET"),
        signature_tolerance_secs: optional("STRIPE_SIGNATURE_TOLERANCE_SECS")
            .map(|v| v.parse::<i64>())
            .transpose()
            .context("STRIPE_SIGNATURE_TOLERANCE_SECS is invalid")?
            .unwrap_or(DEFAULT_TOLERANCE_SECS),
    };

    Ok(DotEnvyConfig {
        backend_server,
        database,
        supabase,
        stripe,
    })
}

pub fn get_stage() -> Stage {
    dotenvy::dotenv().ok();

    let stage_str = std::env::var("STAGE").unwrap_or_default();
    Stage::try_from(&stage_str).unwrap_or_default()
}

pub fn required(key: &str) -> Result<String> {
    optional(key).with_context(|| format!("{key} is missing"))
}

/// Trimmed value, `None` when unset or blank.
pub fn optional(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
