use std::sync::Arc;

use chrono::Timelike;
use crates::domain::{
    repositories::{email_jobs::EmailJobRepository, profiles::ProfileRepository},
    value_objects::{
        clock::Clock,
        email_jobs::{EmailJobSpec, QueueStats},
        enums::email_job_types::EmailJobType,
    },
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum EmailSchedulingError {
    #[error("no valid jobs in request")]
    NothingToEnqueue,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl EmailSchedulingError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            EmailSchedulingError::NothingToEnqueue => StatusCode::BAD_REQUEST,
            EmailSchedulingError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, EmailSchedulingError>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnqueueSummary {
    pub requested: usize,
    pub enqueued: usize,
    pub skipped: usize,
}

pub struct EmailSchedulingUseCase<J, P>
where
    J: EmailJobRepository + Send + Sync + 'static,
    P: ProfileRepository + Send + Sync + 'static,
{
    job_repo: Arc<J>,
    profile_repo: Arc<P>,
    clock: Arc<dyn Clock>,
}

impl<J, P> EmailSchedulingUseCase<J, P>
where
    J: EmailJobRepository + Send + Sync + 'static,
    P: ProfileRepository + Send + Sync + 'static,
{
    pub fn new(job_repo: Arc<J>, profile_repo: Arc<P>, clock: Arc<dyn Clock>) -> Self {
        Self {
            job_repo,
            profile_repo,
            clock,
        }
    }

    /// Inserts every valid spec in one statement. Invalid specs are logged and skipped.
    pub async fn enqueue_batch(&self, specs: Vec<EmailJobSpec>) -> UseCaseResult<EnqueueSummary> {
        let requested = specs.len();
        let now = self.clock.now();

        let rows: Vec<_> = specs
            .into_iter()
            .filter_map(|spec| match spec.validate() {
                Ok(()) => Some(spec.into_insert_entity(now)),
                Err(reason) => {
                    warn!(
                        user_id = %spec.user_id,
                        job_type = %spec.job_type,
                        %reason,
                        "email_scheduling: skipping invalid job"
                    );
                    None
                }
            })
            .collect();

        if rows.is_empty() {
            if requested == 0 {
                return Ok(EnqueueSummary {
                    requested,
                    enqueued: 0,
                    skipped: 0,
                });
            }
            return Err(EmailSchedulingError::NothingToEnqueue);
        }

        let enqueued = self.job_repo.enqueue_batch(rows).await.map_err(|err| {
            error!(requested, db_error = ?err, "email_scheduling: failed to enqueue jobs");
            EmailSchedulingError::Internal(err)
        })?;

        info!(requested, enqueued, "email_scheduling: jobs enqueued");
        Ok(EnqueueSummary {
            requested,
            enqueued,
            skipped: requested - enqueued.min(requested),
        })
    }

    /// Fans out one digest job per profile whose preferred hour is the current UTC hour.
    pub async fn schedule_daily_digests(&self) -> UseCaseResult<EnqueueSummary> {
        let hour = self.clock.now().hour() as i32;
        let recipients = self
            .profile_repo
            .list_digest_recipients(hour)
            .await
            .map_err(|err| {
                error!(hour, db_error = ?err, "email_scheduling: failed to list digest recipients");
                EmailSchedulingError::Internal(err)
            })?;

        let specs: Vec<EmailJobSpec> = recipients
            .into_iter()
            .filter_map(|profile| {
                let email = profile.email?;
                Some(EmailJobSpec::new(EmailJobType::DailyDigest, profile.id, email))
            })
            .collect();

        info!(hour, recipients = specs.len(), "email_scheduling: scheduling daily digests");
        match self.enqueue_batch(specs).await {
            Err(EmailSchedulingError::NothingToEnqueue) => {
                warn!(hour, "email_scheduling: no digest recipient had a usable address");
                Ok(EnqueueSummary {
                    requested: 0,
                    enqueued: 0,
                    skipped: 0,
                })
            }
            other => other,
        }
    }

    pub async fn queue_stats(&self) -> UseCaseResult<QueueStats> {
        self.job_repo.queue_stats().await.map_err(|err| {
            error!(db_error = ?err, "email_scheduling: failed to read queue stats");
            EmailSchedulingError::Internal(err)
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};
    use crates::domain::{
        entities::profiles::ProfileEntity,
        repositories::{email_jobs::MockEmailJobRepository, profiles::MockProfileRepository},
    };
    use mockall::predicate::eq;
    use uuid::Uuid;

    use super::*;

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn clock_at_hour(hour: u32) -> Arc<dyn Clock> {
        Arc::new(FixedClock(
            Utc.with_ymd_and_hms(2024, 5, 1, hour, 15, 0).unwrap(),
        ))
    }

    fn profile(email: Option<&str>) -> ProfileEntity {
        ProfileEntity {
            id: Uuid::new_v4(),
            email: email.map(str::to_string),
            first_name: Some("Ada".to_string()),
            is_admin: false,
            daily_email_enabled: true,
            daily_email_hour: 8,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn enqueue_batch_inserts_valid_specs_as_pending() {
        let mut job_repo = MockEmailJobRepository::new();
        job_repo
            .expect_enqueue_batch()
            .withf(|rows| {
                rows.len() == 2
                    && rows
                        .iter()
                        .all(|r| r.status == "pending" && r.retry_count == 0)
            })
            .times(1)
            .returning(|rows| {
                let inserted = rows.len();
                Box::pin(async move { Ok(inserted) })
            });

        let usecase = EmailSchedulingUseCase::new(
            Arc::new(job_repo),
            Arc::new(MockProfileRepository::new()),
            clock_at_hour(8),
        );

        let summary = usecase
            .enqueue_batch(vec![
                EmailJobSpec::new(EmailJobType::GoalReminder, Uuid::new_v4(), "a@shop.com"),
                EmailJobSpec::new(EmailJobType::GoalReminder, Uuid::new_v4(), "broken"),
                EmailJobSpec::new(EmailJobType::DailyDigest, Uuid::new_v4(), "b@shop.com"),
            ])
            .await
            .unwrap();

        assert_eq!(
            summary,
            EnqueueSummary {
                requested: 3,
                enqueued: 2,
                skipped: 1
            }
        );
    }

    #[tokio::test]
    async fn enqueue_batch_with_only_invalid_specs_is_rejected() {
        let mut job_repo = MockEmailJobRepository::new();
        job_repo.expect_enqueue_batch().never();

        let usecase = EmailSchedulingUseCase::new(
            Arc::new(job_repo),
            Arc::new(MockProfileRepository::new()),
            clock_at_hour(8),
        );

        let err = usecase
            .enqueue_batch(vec![EmailJobSpec::new(
                EmailJobType::DailyDigest,
                Uuid::new_v4(),
                "  ",
            )])
            .await
            .unwrap_err();

        assert!(matches!(err, EmailSchedulingError::NothingToEnqueue));
    }

    #[tokio::test]
    async fn daily_digests_target_the_current_utc_hour() {
        let mut profile_repo = MockProfileRepository::new();
        profile_repo
            .expect_list_digest_recipients()
            .with(eq(8))
            .times(1)
            .returning(|_| {
                let profiles = vec![profile(Some("a@shop.com")), profile(None)];
                Box::pin(async move { Ok(profiles) })
            });

        let mut job_repo = MockEmailJobRepository::new();
        job_repo
            .expect_enqueue_batch()
            .withf(|rows| rows.len() == 1 && rows[0].job_type == "daily_digest" && rows[0].priority == 1)
            .returning(|rows| {
                let inserted = rows.len();
                Box::pin(async move { Ok(inserted) })
            });

        let usecase = EmailSchedulingUseCase::new(
            Arc::new(job_repo),
            Arc::new(profile_repo),
            clock_at_hour(8),
        );

        let summary = usecase.schedule_daily_digests().await.unwrap();

        assert_eq!(summary.enqueued, 1);
    }

    #[tokio::test]
    async fn queue_stats_passes_through() {
        let mut job_repo = MockEmailJobRepository::new();
        job_repo.expect_queue_stats().returning(|| {
            Box::pin(async {
                Ok(QueueStats {
                    pending: 3,
                    total: 3,
                    ..Default::default()
                })
            })
        });

        let usecase = EmailSchedulingUseCase::new(
            Arc::new(job_repo),
            Arc::new(MockProfileRepository::new()),
            clock_at_hour(0),
        );

        assert_eq!(usecase.queue_stats().await.unwrap().pending, 3);
    }
}
