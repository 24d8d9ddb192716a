pub mod email_queue;
pub mod grace_periods;
pub mod payment_webhooks;
