use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::error;
use url::Url;

use super::{MailTransport, OutgoingEmail};

/// Sends mail through a Resend-compatible JSON API (`POST /emails`, bearer key).
pub struct HttpMailTransport {
    client: Client,
    endpoint: Url,
    api_key: String,
    from_address: String,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: Option<String>,
}

impl HttpMailTransport {
    pub fn new(
        endpoint: Url,
        api_key: String,
        from_address: String,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build mail http client")?;

        Ok(Self {
            client,
            endpoint,
            api_key,
            from_address,
        })
    }
}

#[async_trait]
impl MailTransport for HttpMailTransport {
    async fn send(&self, email: OutgoingEmail) -> Result<String> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&json!({
                "from": self.from_address,
                "to": [email.to],
                "subject": email.subject,
                "html": email.html,
                "text": email.text,
            }))
            .send()
            .await
            .map_err(sanitize_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = match response.text().await {
                Ok(text) if !text.is_empty() => text,
                Ok(_) => "<empty response body>".to_string(),
                Err(err) => format!("<failed to read response body: {err}>"),
            };
            error!(status = %status, response_body = %body, "mail: provider rejected message");
            return Err(anyhow!("mail provider returned non-success status: {}", status));
        }

        let parsed: SendResponse = response
            .json()
            .await
            .context("mail provider returned an unreadable body")?;

        parsed
            .id
            .ok_or_else(|| anyhow!("mail provider response is missing a message id"))
    }

    fn transport_name(&self) -> &'static str {
        "http"
    }
}

fn sanitize_reqwest_error(error: reqwest::Error) -> anyhow::Error {
    if error.is_timeout() {
        return anyhow!("mail provider request timed out");
    }
    if error.is_connect() {
        return anyhow!("mail provider connection failed");
    }
    anyhow!("mail provider request failed")
}
