pub mod email_job_statuses;
pub mod email_job_types;
pub mod payment_statuses;
pub mod plan_types;
pub mod sentiments;
pub mod transaction_statuses;
pub mod transaction_types;
pub mod worker_states;
