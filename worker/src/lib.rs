pub mod axum_http;
pub mod config;
pub mod email_queue;
pub mod grace_period_sweep;
pub mod usecases;
