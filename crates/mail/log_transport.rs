use anyhow::Result;
use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use super::{MailTransport, OutgoingEmail};

/// Writes outgoing mail to the log instead of delivering it. Used in local and development.
#[derive(Debug, Default, Clone)]
pub struct LogMailTransport;

#[async_trait]
impl MailTransport for LogMailTransport {
    async fn send(&self, email: OutgoingEmail) -> Result<String> {
        let message_id = format!("log-{}", Uuid::new_v4());
        info!(
            %message_id,
            to = %email.to,
            subject = %email.subject,
            html_bytes = email.html.len(),
            "mail: delivery skipped, logged instead"
        );
        Ok(message_id)
    }

    fn transport_name(&self) -> &'static str {
        "log"
    }
}
