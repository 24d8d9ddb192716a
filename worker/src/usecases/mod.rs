pub mod daily_email_content;
pub mod email_handlers;
pub mod email_queue;
