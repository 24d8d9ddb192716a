use anyhow::{Result, anyhow, bail};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

pub const INVOICE_PAYMENT_FAILED: &str = "invoice.payment_failed";
pub const INVOICE_PAYMENT_SUCCEEDED: &str = "invoice.payment_succeeded";
pub const CUSTOMER_SUBSCRIPTION_DELETED: &str = "customer.subscription.deleted";

/// Checks the `Stripe-Signature` header against the endpoint secret and decodes the event.
pub struct StripeWebhookVerifier {
    webhook_secret: String,
    tolerance_secs: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub created: Option<i64>,
    pub livemode: Option<bool>,
    pub data: StripeEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

/// Identifiers and amounts pulled from an invoice or subscription object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BillingObjectRefs {
    pub object_id: Option<String>,
    pub customer_id: Option<String>,
    pub subscription_id: Option<String>,
    pub amount_minor: i64,
    pub currency: Option<String>,
    pub failure_reason: Option<String>,
}

impl StripeEvent {
    pub fn billing_refs(&self) -> BillingObjectRefs {
        let object = &self.data.object;
        let text = |key: &str| object.get(key).and_then(|v| v.as_str()).map(str::to_string);
        let is_subscription = object.get("object").and_then(|v| v.as_str()) == Some("subscription");

        let subscription_id = if is_subscription {
            text("id")
        } else {
            text("subscription")
        };
        let amount_minor = ["amount_paid", "amount_due"]
            .iter()
            .find_map(|key| object.get(*key).and_then(|v| v.as_i64()).filter(|v| *v > 0))
            .unwrap_or(0);
        let failure_reason = object
            .get("last_finalization_error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
            .map(str::to_string);

        BillingObjectRefs {
            object_id: text("id"),
            customer_id: text("customer"),
            subscription_id,
            amount_minor,
            currency: text("currency"),
            failure_reason,
        }
    }
}

impl StripeWebhookVerifier {
    pub fn new(webhook_secret: String) -> Self {
        Self {
            webhook_secret,
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }

    pub fn with_tolerance(mut self, tolerance_secs: i64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }

    pub fn verify(&self, payload: &[u8], signature_header: &str, now_unix: i64) -> Result<StripeEvent> {
        let mut timestamp: Option<&str> = None;
        let mut signatures: Vec<&str> = Vec::new();

        for part in signature_header.split(',') {
            let part = part.trim();
            if let Some(rest) = part.strip_prefix("t=") {
                timestamp = Some(rest);
            } else if let Some(rest) = part.strip_prefix("v1=") {
                signatures.push(rest);
            }
        }

        let timestamp = timestamp.ok_or_else(|| anyhow!("missing timestamp in stripe-signature"))?;
        if signatures.is_empty() {
            bail!("missing v1 in stripe-signature");
        }
        let signed_at: i64 = timestamp
            .parse()
            .map_err(|_| anyhow!("invalid timestamp in stripe-signature"))?;
        if (now_unix - signed_at).abs() > self.tolerance_secs {
            bail!("stripe-signature timestamp outside tolerance");
        }

        let signed_payload = format!("{}.{}", timestamp, String::from_utf8_lossy(payload));
        let matched = signatures.iter().any(|candidate| {
            let Ok(provided) = hex::decode(candidate) else {
                return false;
            };
            let Ok(mut mac) = HmacSha256::new_from_slice(self.webhook_secret.as_bytes()) else {
                return false;
            };
            mac.update(signed_payload.as_bytes());
            mac.verify_slice(&provided).is_ok()
        });
        if !matched {
            bail!("invalid webhook signature");
        }

        let event: StripeEvent = serde_json::from_slice(payload)?;
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";

    fn sign(payload: &str, timestamp: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.{payload}").as_bytes());
        format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
    }

    fn invoice_payload() -> String {
        serde_json::json!({
            "id": "evt_1",
            "type": "invoice.payment_failed",
            "created": 1_700_000_000,
            "data": { "object": {
                "object": "invoice",
                "id": "in_1",
                "customer": "cus_1",
                "subscription": "sub_1",
                "amount_due": 2900,
                "currency": "usd"
            }}
        })
        .to_string()
    }

    #[test]
    fn accepts_valid_signature_and_extracts_refs() {
        let payload = invoice_payload();
        let header = sign(&payload, 1_700_000_000);
        let verifier = StripeWebhookVerifier::new(SECRET.to_string());

        let event = verifier
            .verify(payload.as_bytes(), &header, 1_700_000_010)
            .unwrap();

        assert_eq!(event.id, "evt_1");
        assert_eq!(event.type_, INVOICE_PAYMENT_FAILED);
        let refs = event.billing_refs();
        assert_eq!(refs.customer_id.as_deref(), Some("cus_1"));
        assert_eq!(refs.subscription_id.as_deref(), Some("sub_1"));
        assert_eq!(refs.amount_minor, 2900);
    }

    #[test]
    fn rejects_tampered_payload() {
        let payload = invoice_payload();
        let header = sign(&payload, 1_700_000_000);
        let tampered = payload.replace("cus_1", "cus_2");
        let verifier = StripeWebhookVerifier::new(SECRET.to_string());

        let err = verifier
            .verify(tampered.as_bytes(), &header, 1_700_000_000)
            .unwrap_err();

        assert!(err.to_string().contains("invalid webhook signature"));
    }

    #[test]
    fn rejects_stale_timestamp_and_missing_parts() {
        let payload = invoice_payload();
        let verifier = StripeWebhookVerifier::new(SECRET.to_string());

        let stale = sign(&payload, 1_700_000_000);
        assert!(verifier.verify(payload.as_bytes(), &stale, 1_700_001_000).is_err());
        assert!(verifier.verify(payload.as_bytes(), "v1=abcd", 1_700_000_000).is_err());
        assert!(verifier.verify(payload.as_bytes(), "t=1700000000", 1_700_000_000).is_err());
    }

    #[test]
    fn subscription_objects_use_their_own_id() {
        let event: StripeEvent = serde_json::from_value(serde_json::json!({
            "id": "evt_2",
            "type": "customer.subscription.deleted",
            "data": { "object": { "object": "subscription", "id": "sub_9", "customer": "cus_9" } }
        }))
        .unwrap();

        let refs = event.billing_refs();
        assert_eq!(refs.subscription_id.as_deref(), Some("sub_9"));
        assert_eq!(refs.amount_minor, 0);
    }
}
