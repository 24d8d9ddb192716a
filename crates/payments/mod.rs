pub mod stripe_webhooks;
