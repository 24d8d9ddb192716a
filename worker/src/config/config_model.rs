use std::{path::PathBuf, time::Duration};

use backend::config::stage::Stage;
use url::Url;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub stage: Stage,
    pub worker_server: WorkerServer,
    pub database: Database,
    pub email_queue: EmailQueue,
    pub mail: Mail,
    pub grace_sweep: GraceSweep,
    pub internal: Internal,
}

#[derive(Debug, Clone)]
pub struct WorkerServer {
    pub port: u16,
    pub timeout: u64,
    pub body_limit: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct EmailQueue {
    pub max_concurrent_jobs: i64,
    pub poll_interval: Duration,
    pub stale_after: Duration,
    pub heartbeat_interval: Duration,
    pub template_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub enum MailProvider {
    Log,
    Http {
        endpoint: Url,
        api_key: String,
        from_address: String,
    },
}

#[derive(Debug, Clone)]
pub struct Mail {
    pub provider: MailProvider,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct GraceSweep {
    /// `None` disables the periodic sweep; the internal route still works.
    pub interval: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct Internal {
    pub trigger_token: Option<String>,
}
