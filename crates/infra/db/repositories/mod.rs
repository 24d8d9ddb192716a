pub mod daily_email_contents;
pub mod email_analytics;
pub mod email_jobs;
pub mod payment_transactions;
pub mod profiles;
pub mod user_activity;
pub mod user_plans;
pub mod worker_statuses;
