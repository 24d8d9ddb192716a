use std::{collections::BTreeMap, sync::Arc, time::Duration};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{Level, warn};
use url::Url;

const QUEUE_CAPACITY: usize = 256;
const CONTENT_LIMIT: usize = 2000;

#[derive(Debug, Clone)]
pub(crate) struct AlertEvent {
    pub(crate) level: Level,
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) service_name: String,
    pub(crate) environment: String,
    pub(crate) component: String,
    pub(crate) target: String,
    pub(crate) location: Option<String>,
    pub(crate) message: Option<String>,
    pub(crate) fields: BTreeMap<String, String>,
    pub(crate) span_path: Vec<String>,
}

impl AlertEvent {
    pub(crate) fn to_content(&self) -> String {
        let mut lines = vec![format!(
            "**{}** `{}` `{}` `{}`",
            self.service_name,
            self.environment,
            self.component,
            self.level.as_str()
        )];

        lines.push(format!(
            "`{}` `{}`{}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.target,
            self.location
                .as_ref()
                .map(|l| format!(" `{l}`"))
                .unwrap_or_default()
        ));

        if let Some(message) = self.message.as_ref().filter(|m| !m.trim().is_empty()) {
            lines.push(format!("> {}", message.trim()));
        }
        if !self.span_path.is_empty() {
            lines.push(format!("spans: `{}`", self.span_path.join(" > ")));
        }
        for (key, value) in &self.fields {
            lines.push(format!("- `{key}` = `{value}`"));
        }

        truncate(lines.join("\n"), CONTENT_LIMIT)
    }
}

#[async_trait]
pub(crate) trait AlertSink: Send + Sync {
    async fn deliver(&self, event: &AlertEvent) -> Result<()>;
    fn sink_name(&self) -> &'static str;
}

/// Posts alerts to a chat webhook. The body carries both `content` (Discord) and
/// `text` (Slack) so either receiver accepts it.
pub(crate) struct ChatWebhookSink {
    webhook_url: Url,
    client: Client,
}

impl ChatWebhookSink {
    pub(crate) fn new(webhook_url: Url) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(3))
            .build()
            .map_err(|_| anyhow!("failed to build alert webhook client"))?;

        Ok(Self {
            webhook_url,
            client,
        })
    }
}

#[async_trait]
impl AlertSink for ChatWebhookSink {
    async fn deliver(&self, event: &AlertEvent) -> Result<()> {
        let content = event.to_content();
        let response = self
            .client
            .post(self.webhook_url.clone())
            .json(&json!({ "content": content, "text": content }))
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    anyhow!("alert webhook request timed out")
                } else if err.is_connect() {
                    anyhow!("alert webhook connection failed")
                } else {
                    anyhow!("alert webhook request failed")
                }
            })?;

        if response.status().is_success() {
            return Ok(());
        }
        Err(anyhow!(
            "alert webhook returned non-success status: {}",
            response.status()
        ))
    }

    fn sink_name(&self) -> &'static str {
        "chat_webhook"
    }
}

/// Hands alerts to a background task so logging never waits on the network.
#[derive(Clone)]
pub(crate) struct AlertDispatcher {
    tx: mpsc::Sender<AlertEvent>,
}

impl AlertDispatcher {
    pub(crate) fn spawn(sinks: Vec<Arc<dyn AlertSink>>) -> Self {
        let (tx, mut rx) = mpsc::channel::<AlertEvent>(QUEUE_CAPACITY);

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                for sink in &sinks {
                    if let Err(error) = sink.deliver(&event).await {
                        warn!(sink = sink.sink_name(), error = %error, "observability: alert delivery failed");
                    }
                }
            }
        });

        Self { tx }
    }

    pub(crate) fn dispatch(&self, event: AlertEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("observability: alert queue full, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("observability: alert queue closed, dropping event");
            }
        }
    }
}

pub(crate) fn truncate(content: String, limit: usize) -> String {
    const SUFFIX: &str = "\n… (truncated)";

    if content.chars().count() <= limit {
        return content;
    }
    let allowed = limit.saturating_sub(SUFFIX.chars().count());
    let mut truncated: String = content.chars().take(allowed).collect();
    truncated.push_str(SUFFIX);
    truncated
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn event() -> AlertEvent {
        AlertEvent {
            level: Level::ERROR,
            timestamp: Utc::now(),
            service_name: "bizzin".to_string(),
            environment: "production".to_string(),
            component: "worker".to_string(),
            target: "worker::usecases".to_string(),
            location: Some("worker/src/usecases/email_queue.rs:10".to_string()),
            message: Some("email_queue: claim failed".to_string()),
            fields: BTreeMap::from([("job_id".to_string(), "abc".to_string())]),
            span_path: vec!["cycle".to_string()],
        }
    }

    #[test]
    fn content_lists_context_message_and_fields() {
        let content = event().to_content();

        assert!(content.starts_with("**bizzin** `production` `worker` `ERROR`"));
        assert!(content.contains("> email_queue: claim failed"));
        assert!(content.contains("- `job_id` = `abc`"));
        assert!(content.contains("spans: `cycle`"));
    }

    #[test]
    fn truncate_respects_limit() {
        let long = "x".repeat(3000);
        let truncated = truncate(long, CONTENT_LIMIT);

        assert_eq!(truncated.chars().count(), CONTENT_LIMIT);
        assert!(truncated.ends_with("(truncated)"));
        assert_eq!(truncate("short".to_string(), CONTENT_LIMIT), "short");
    }

    struct RecordingSink {
        seen: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl AlertSink for RecordingSink {
        async fn deliver(&self, event: &AlertEvent) -> Result<()> {
            self.seen
                .lock()
                .unwrap()
                .push(event.message.clone().unwrap_or_default());
            Ok(())
        }

        fn sink_name(&self) -> &'static str {
            "recording"
        }
    }

    #[tokio::test]
    async fn dispatcher_forwards_events_to_sinks() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = AlertDispatcher::spawn(vec![Arc::new(RecordingSink {
            seen: Arc::clone(&seen),
        })]);

        dispatcher.dispatch(event());

        for _ in 0..50 {
            if !seen.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(seen.lock().unwrap().as_slice(), ["email_queue: claim failed"]);
    }
}
