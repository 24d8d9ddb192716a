pub mod http_transport;
pub mod log_transport;
pub mod templates;

use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[async_trait]
#[automock]
pub trait MailTransport {
    /// Delivers one message and returns the provider's message id.
    async fn send(&self, email: OutgoingEmail) -> Result<String>;

    fn transport_name(&self) -> &'static str;
}
