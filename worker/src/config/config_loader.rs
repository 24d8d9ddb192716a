use std::{path::PathBuf, str::FromStr, time::Duration};

use anyhow::{Context, Result, bail};
use backend::config::{config_loader as shared, stage::Stage};
use url::Url;

use super::config_model::{
    Database, DotEnvyConfig, EmailQueue, GraceSweep, Internal, Mail, MailProvider, WorkerServer,
};

const DEFAULT_MAIL_ENDPOINT: &str = "https://api.resend.com/emails";

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();
    load_from(shared::get_stage(), shared::optional)
}

/// Builds the config from `lookup`, which returns trimmed non-empty values only.
pub fn load_from(stage: Stage, lookup: impl Fn(&str) -> Option<String>) -> Result<DotEnvyConfig> {
    let required = |key: &str| lookup(key).with_context(|| format!("{key} is missing"));

    let worker_server = WorkerServer {
        port: parse(&required("SERVER_PORT_WORKER")?, "SERVER_PORT_WORKER")?,
        body_limit: parse_or(&lookup, "SERVER_BODY_LIMIT", 10)?,
        timeout: parse_or(&lookup, "SERVER_TIMEOUT", 30)?,
    };

    let database = Database {
        url: required("DATABASE_URL")?,
        max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
    };

    let default_concurrency = if stage.is_production() { 10 } else { 3 };
    let max_concurrent_jobs: i64 =
        parse_or(&lookup, "EMAIL_QUEUE_MAX_CONCURRENT_JOBS", default_concurrency)?;
    if max_concurrent_jobs < 1 {
        bail!("EMAIL_QUEUE_MAX_CONCURRENT_JOBS must be at least 1");
    }

    let email_queue = EmailQueue {
        max_concurrent_jobs,
        poll_interval: Duration::from_secs(parse_or(&lookup, "EMAIL_QUEUE_POLL_INTERVAL_SECS", 30)?),
        stale_after: Duration::from_secs(parse_or(&lookup, "EMAIL_QUEUE_STALE_AFTER_SECS", 900)?),
        heartbeat_interval: Duration::from_secs(parse_or(
            &lookup,
            "WORKER_HEARTBEAT_INTERVAL_SECS",
            30,
        )?),
        template_dir: lookup("EMAIL_TEMPLATE_DIR").map(PathBuf::from),
    };

    let default_transport = if stage.is_production() { "http" } else { "log" };
    let provider = match lookup("MAIL_TRANSPORT")
        .unwrap_or_else(|| default_transport.to_string())
        .to_ascii_lowercase()
        .as_str()
    {
        "log" => MailProvider::Log,
        "http" => MailProvider::Http {
            endpoint: Url::parse(
                &lookup("MAIL_API_URL").unwrap_or_else(|| DEFAULT_MAIL_ENDPOINT.to_string()),
            )
            .context("MAIL_API_URL is invalid")?,
            api_key: required("MAIL_API_KEY")?,
            from_address: required("MAIL_FROM_ADDRESS")?,
        },
        other => bail!("MAIL_TRANSPORT must be log or http, got {other}"),
    };

    let mail = Mail {
        provider,
        request_timeout: Duration::from_secs(parse_or(&lookup, "MAIL_REQUEST_TIMEOUT_SECS", 15)?),
    };

    let sweep_secs: u64 = parse_or(&lookup, "GRACE_PERIOD_SWEEP_INTERVAL_SECS", 3600)?;
    let grace_sweep = GraceSweep {
        interval: (sweep_secs > 0).then(|| Duration::from_secs(sweep_secs)),
    };

    let internal = Internal {
        trigger_token: lookup("INTERNAL_TRIGGER_TOKEN"),
    };

    Ok(DotEnvyConfig {
        stage,
        worker_server,
        database,
        email_queue,
        mail,
        grace_sweep,
        internal,
    })
}

fn parse<T>(value: &str, key: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value.parse().with_context(|| format!("{key} is invalid"))
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(value) => parse(&value, key),
        None => Ok(default),
    }
}
