use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::domain::{
    entities::email_jobs::InsertEmailJobEntity,
    value_objects::enums::{email_job_statuses::EmailJobStatus, email_job_types::EmailJobType},
};

pub const DEFAULT_MAX_RETRIES: i32 = 3;
pub const RETRY_BASE_DELAY_MS: i64 = 30_000;
pub const RETRY_MAX_DELAY_MS: i64 = 300_000;

/// A job to enqueue. Everything but the target is optional and defaulted on insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailJobSpec {
    pub job_type: EmailJobType,
    pub user_id: Uuid,
    pub user_email: String,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub scheduled_for: Option<DateTime<Utc>>,
    #[serde(default)]
    pub max_retries: Option<i32>,
    #[serde(default)]
    pub job_data: Option<Value>,
}

impl EmailJobSpec {
    pub fn new(job_type: EmailJobType, user_id: Uuid, user_email: impl Into<String>) -> Self {
        Self {
            job_type,
            user_id,
            user_email: user_email.into(),
            priority: None,
            scheduled_for: None,
            max_retries: None,
            job_data: None,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let email = self.user_email.trim();
        if email.is_empty() {
            return Err("user_email is empty".to_string());
        }
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => {}
            _ => return Err(format!("user_email is malformed: {email}")),
        }
        if self.max_retries.is_some_and(|m| m < 0) {
            return Err("max_retries must not be negative".to_string());
        }
        Ok(())
    }

    pub fn into_insert_entity(self, now: DateTime<Utc>) -> InsertEmailJobEntity {
        InsertEmailJobEntity {
            job_type: self.job_type.to_string(),
            user_id: self.user_id,
            user_email: self.user_email.trim().to_string(),
            status: EmailJobStatus::Pending.to_string(),
            priority: self
                .priority
                .unwrap_or_else(|| self.job_type.default_priority()),
            scheduled_for: self.scheduled_for.unwrap_or(now),
            retry_count: 0,
            max_retries: self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            job_data: self.job_data.unwrap_or_else(|| json!({})),
        }
    }
}

/// Delay before the given attempt is retried: 30s doubling per attempt, capped at 5 minutes.
pub fn retry_delay_ms(retry_count: i32) -> i64 {
    let exponent = retry_count.clamp(0, 31) as u32;
    RETRY_BASE_DELAY_MS
        .saturating_mul(2_i64.saturating_pow(exponent))
        .min(RETRY_MAX_DELAY_MS)
}

#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    Retry {
        retry_count: i32,
        next_run_at: DateTime<Utc>,
    },
    GiveUp {
        retry_count: i32,
    },
}

/// Decides what happens to a job after a failed attempt. A job is attempted at most
/// `max_retries + 1` times and never records more than `max_retries` retries.
pub fn decide_retry(retry_count: i32, max_retries: i32, now: DateTime<Utc>) -> RetryDecision {
    let attempt = retry_count.saturating_add(1);
    if attempt <= max_retries {
        RetryDecision::Retry {
            retry_count: attempt,
            next_run_at: now + Duration::milliseconds(retry_delay_ms(attempt)),
        }
    } else {
        RetryDecision::GiveUp {
            retry_count: retry_count.clamp(0, max_retries.max(0)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueueStats {
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
    pub retrying: i64,
    pub total: i64,
    pub oldest_due_at: Option<DateTime<Utc>>,
}

impl QueueStats {
    pub fn from_counts(counts: &BTreeMap<String, i64>, oldest_due_at: Option<DateTime<Utc>>) -> Self {
        let count = |status: EmailJobStatus| counts.get(status.as_str()).copied().unwrap_or(0);
        Self {
            pending: count(EmailJobStatus::Pending),
            processing: count(EmailJobStatus::Processing),
            completed: count(EmailJobStatus::Completed),
            failed: count(EmailJobStatus::Failed),
            retrying: count(EmailJobStatus::Retrying),
            total: counts.values().sum(),
            oldest_due_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GoalReminderData {
    #[serde(default)]
    pub goal_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MilestoneAlertData {
    #[serde(default)]
    pub milestone_id: Option<Uuid>,
}
