pub mod clock;
pub mod email_content;
pub mod email_jobs;
pub mod enums;
pub mod grace_periods;
