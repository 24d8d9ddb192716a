pub mod daily_email_contents;
pub mod email_analytics;
pub mod email_jobs;
pub mod goals;
pub mod journal_entries;
pub mod milestones;
pub mod payment_transactions;
pub mod profiles;
pub mod user_plans;
pub mod worker_statuses;
