pub mod email_scheduling;
pub mod grace_periods;
pub mod payment_events;
