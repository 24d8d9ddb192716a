use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use crates::{
    domain::{
        entities::{email_jobs::EmailJobEntity, worker_statuses::UpsertWorkerStatusEntity},
        repositories::{
            daily_email_contents::DailyEmailContentRepository,
            email_analytics::EmailAnalyticsRepository, email_jobs::EmailJobRepository,
            profiles::ProfileRepository, user_activity::UserActivityRepository,
            worker_statuses::WorkerStatusRepository,
        },
        value_objects::{
            clock::Clock,
            email_jobs::{RetryDecision, decide_retry},
            enums::{email_job_types::EmailJobType, worker_states::WorkerState},
        },
    },
    mail::{MailTransport, templates::TemplateStore},
};
use futures_util::future::join_all;
use rand::{Rng, distributions::Alphanumeric};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::{
    daily_email_content::DailyEmailContentGenerator,
    email_handlers::{EmailJobHandlers, HandlerOutcome, JobHandler},
};
use crate::config::config_model::EmailQueue;

const SHUTDOWN_POLL: Duration = Duration::from_secs(1);

pub struct EmailQueueDeps {
    pub job_repo: Arc<dyn EmailJobRepository + Send + Sync>,
    pub status_repo: Arc<dyn WorkerStatusRepository + Send + Sync>,
    pub profile_repo: Arc<dyn ProfileRepository + Send + Sync>,
    pub activity_repo: Arc<dyn UserActivityRepository + Send + Sync>,
    pub content_repo: Arc<dyn DailyEmailContentRepository + Send + Sync>,
    pub analytics_repo: Arc<dyn EmailAnalyticsRepository + Send + Sync>,
    pub transport: Arc<dyn MailTransport + Send + Sync>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct CycleSummary {
    pub claimed: usize,
    pub completed: usize,
    pub retried: usize,
    pub failed: usize,
    pub released_stale: usize,
    pub skipped: bool,
}

impl CycleSummary {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JobOutcome {
    Completed,
    Retried,
    Failed,
}

/// Snapshot served by the internal metrics route. Counters are per UTC day.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerMetrics {
    pub worker_id: String,
    pub status: WorkerState,
    pub metrics_date: NaiveDate,
    pub jobs_processed_today: i32,
    pub error_count: i32,
    pub started_at: DateTime<Utc>,
    pub last_cycle_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct DailyCounters {
    date: NaiveDate,
    processed: i32,
    errors: i32,
    last_cycle_at: Option<DateTime<Utc>>,
}

impl DailyCounters {
    fn roll_over(&mut self, now: DateTime<Utc>) {
        let today = now.date_naive();
        if today != self.date {
            self.date = today;
            self.processed = 0;
            self.errors = 0;
        }
    }
}

struct CycleGuard<'a>(&'a AtomicBool);

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct EmailQueueWorker {
    worker_id: String,
    job_repo: Arc<dyn EmailJobRepository + Send + Sync>,
    status_repo: Arc<dyn WorkerStatusRepository + Send + Sync>,
    handler: Arc<dyn JobHandler + Send + Sync>,
    clock: Arc<dyn Clock>,
    settings: EmailQueue,
    started_at: DateTime<Utc>,
    processing: AtomicBool,
    shutting_down: AtomicBool,
    counters: Mutex<DailyCounters>,
    heartbeat_task: Mutex<Option<JoinHandle<()>>>,
}

impl EmailQueueWorker {
    pub fn new(
        worker_id: String,
        job_repo: Arc<dyn EmailJobRepository + Send + Sync>,
        status_repo: Arc<dyn WorkerStatusRepository + Send + Sync>,
        handler: Arc<dyn JobHandler + Send + Sync>,
        clock: Arc<dyn Clock>,
        settings: EmailQueue,
    ) -> Self {
        let started_at = clock.now();
        Self {
            worker_id,
            job_repo,
            status_repo,
            handler,
            clock,
            settings,
            started_at,
            processing: AtomicBool::new(false),
            shutting_down: AtomicBool::new(false),
            counters: Mutex::new(DailyCounters {
                date: started_at.date_naive(),
                processed: 0,
                errors: 0,
                last_cycle_at: None,
            }),
            heartbeat_task: Mutex::new(None),
        }
    }

    /// Loads templates, wires the job handlers, registers the worker as active and
    /// starts the heartbeat task.
    pub async fn init(deps: EmailQueueDeps, settings: EmailQueue) -> Result<Arc<Self>> {
        let templates = TemplateStore::load(settings.template_dir.as_deref())
            .await
            .context("failed to load email templates")?;

        let content = DailyEmailContentGenerator::new(
            Arc::clone(&deps.activity_repo),
            deps.content_repo,
            Arc::clone(&deps.clock),
        );
        let handler = EmailJobHandlers::new(
            deps.profile_repo,
            deps.activity_repo,
            deps.analytics_repo,
            Arc::new(content),
            deps.transport,
            Arc::new(templates),
            Arc::clone(&deps.clock),
        );

        let worker = Arc::new(Self::new(
            generate_worker_id(deps.clock.now()),
            deps.job_repo,
            deps.status_repo,
            Arc::new(handler),
            deps.clock,
            settings,
        ));

        worker.write_status(WorkerState::Active).await?;
        worker.start_heartbeat();

        info!(
            worker_id = %worker.worker_id,
            max_concurrent_jobs = worker.settings.max_concurrent_jobs,
            "email_queue: worker initialized"
        );
        Ok(worker)
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    fn start_heartbeat(self: &Arc<Self>) {
        let worker = Arc::clone(self);
        let interval = self.settings.heartbeat_interval;
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(err) = worker.heartbeat().await {
                    warn!(worker_id = %worker.worker_id, error = ?err, "email_queue: heartbeat failed");
                }
            }
        });

        if let Ok(mut slot) = self.heartbeat_task.lock() {
            *slot = Some(task);
        }
    }

    /// Runs one poll cycle. Returns a skipped summary when a cycle is already in flight
    /// or shutdown has begun.
    pub async fn process_queued_jobs(&self) -> Result<CycleSummary> {
        if self.is_shutting_down() {
            return Ok(CycleSummary::skipped());
        }
        if self
            .processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            info!(worker_id = %self.worker_id, "email_queue: cycle already running, skipping");
            return Ok(CycleSummary::skipped());
        }
        let _guard = CycleGuard(&self.processing);

        let mut summary = CycleSummary {
            released_stale: self.release_stale_jobs().await.unwrap_or_else(|err| {
                error!(db_error = ?err, "email_queue: failed to release stale jobs");
                0
            }),
            ..CycleSummary::default()
        };

        let now = self.clock.now();
        let jobs = self
            .job_repo
            .claim_due_jobs(&self.worker_id, self.settings.max_concurrent_jobs, now)
            .await
            .map_err(|err| {
                error!(worker_id = %self.worker_id, db_error = ?err, "email_queue: failed to claim jobs");
                err
            })?;
        self.touch_cycle(now);

        if jobs.is_empty() {
            return Ok(summary);
        }
        summary.claimed = jobs.len();
        info!(worker_id = %self.worker_id, claimed = jobs.len(), "email_queue: processing claimed jobs");

        let outcomes = join_all(jobs.iter().map(|job| self.process_email_job(job))).await;
        for outcome in outcomes {
            match outcome {
                JobOutcome::Completed => summary.completed += 1,
                JobOutcome::Retried => summary.retried += 1,
                JobOutcome::Failed => summary.failed += 1,
            }
        }

        info!(
            worker_id = %self.worker_id,
            claimed = summary.claimed,
            completed = summary.completed,
            retried = summary.retried,
            failed = summary.failed,
            "email_queue: cycle finished"
        );
        Ok(summary)
    }

    pub async fn process_email_job(&self, job: &EmailJobEntity) -> JobOutcome {
        let Some(job_type) = EmailJobType::from_str(&job.job_type) else {
            let message = format!("unknown job type: {}", job.job_type);
            warn!(job_id = %job.id, job_type = %job.job_type, "email_queue: unknown job type");
            self.record_error();
            let written = self
                .job_repo
                .mark_failed(job.id, &self.worker_id, job.retry_count, &message, self.clock.now())
                .await;
            self.check_written(job, written, "failed");
            return JobOutcome::Failed;
        };

        let started = Instant::now();
        match self.handler.handle(job, job_type).await {
            Ok(outcome) => {
                let elapsed_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);
                if let HandlerOutcome::Skipped { reason } = &outcome {
                    info!(job_id = %job.id, %job_type, %reason, "email_queue: nothing to send");
                }
                let written = self
                    .job_repo
                    .mark_completed(job.id, &self.worker_id, elapsed_ms, self.clock.now())
                    .await;
                self.check_written(job, written, "completed");
                self.record_success();
                info!(job_id = %job.id, %job_type, elapsed_ms, "email_queue: job completed");
                JobOutcome::Completed
            }
            Err(err) => self.handle_failure(job, &format!("{err:#}")).await,
        }
    }

    async fn handle_failure(&self, job: &EmailJobEntity, message: &str) -> JobOutcome {
        self.record_error();
        let now = self.clock.now();

        match decide_retry(job.retry_count, job.max_retries, now) {
            RetryDecision::Retry {
                retry_count,
                next_run_at,
            } => {
                warn!(
                    job_id = %job.id,
                    retry_count,
                    %next_run_at,
                    error = %message,
                    "email_queue: job failed, scheduling retry"
                );
                let written = self
                    .job_repo
                    .mark_retrying(job.id, &self.worker_id, retry_count, message, next_run_at)
                    .await;
                self.check_written(job, written, "retrying");
                JobOutcome::Retried
            }
            RetryDecision::GiveUp { retry_count } => {
                error!(
                    job_id = %job.id,
                    retry_count,
                    error = %message,
                    "email_queue: job failed permanently"
                );
                let written = self
                    .job_repo
                    .mark_failed(job.id, &self.worker_id, retry_count, message, now)
                    .await;
                self.check_written(job, written, "failed");
                JobOutcome::Failed
            }
        }
    }

    fn check_written(&self, job: &EmailJobEntity, written: Result<bool>, status: &str) {
        match written {
            Ok(true) => {}
            Ok(false) => warn!(
                job_id = %job.id,
                worker_id = %self.worker_id,
                status,
                "email_queue: job no longer owned by this worker, update dropped"
            ),
            Err(err) => error!(
                job_id = %job.id,
                db_error = ?err,
                status,
                "email_queue: failed to update job status"
            ),
        }
    }

    pub async fn release_stale_jobs(&self) -> Result<usize> {
        let stale_after = chrono::Duration::from_std(self.settings.stale_after)?;
        let released = self
            .job_repo
            .release_stale_processing(self.clock.now() - stale_after)
            .await?;
        if released > 0 {
            warn!(released, "email_queue: released stale processing jobs");
        }
        Ok(released)
    }

    pub async fn heartbeat(&self) -> Result<()> {
        let state = if self.processing.load(Ordering::Acquire) {
            WorkerState::Active
        } else {
            WorkerState::Idle
        };
        self.write_status(state).await
    }

    /// Stops the heartbeat, refuses new cycles, waits for the in-flight cycle and
    /// records the worker as stopped.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutting_down.store(true, Ordering::Release);
        if let Some(task) = self.heartbeat_task.lock().ok().and_then(|mut slot| slot.take()) {
            task.abort();
        }

        while self.processing.load(Ordering::Acquire) {
            info!(worker_id = %self.worker_id, "email_queue: waiting for in-flight cycle");
            tokio::time::sleep(SHUTDOWN_POLL).await;
        }

        self.write_status(WorkerState::Stopped).await?;
        info!(worker_id = %self.worker_id, "email_queue: worker stopped");
        Ok(())
    }

    pub fn metrics(&self) -> WorkerMetrics {
        let now = self.clock.now();
        let status = if self.is_shutting_down() {
            WorkerState::Stopped
        } else if self.processing.load(Ordering::Acquire) {
            WorkerState::Active
        } else {
            WorkerState::Idle
        };
        let (metrics_date, jobs_processed_today, error_count, last_cycle_at) =
            self.with_counters(now, |c| (c.date, c.processed, c.errors, c.last_cycle_at));

        WorkerMetrics {
            worker_id: self.worker_id.clone(),
            status,
            metrics_date,
            jobs_processed_today,
            error_count,
            started_at: self.started_at,
            last_cycle_at,
        }
    }

    async fn write_status(&self, state: WorkerState) -> Result<()> {
        let now = self.clock.now();
        let (processed, errors) = self.with_counters(now, |c| (c.processed, c.errors));

        self.status_repo
            .upsert(UpsertWorkerStatusEntity {
                worker_id: self.worker_id.clone(),
                status: state.to_string(),
                jobs_processed_today: processed,
                error_count: errors,
                last_heartbeat: now,
                started_at: self.started_at,
                updated_at: now,
            })
            .await
    }

    fn with_counters<T>(&self, now: DateTime<Utc>, f: impl FnOnce(&mut DailyCounters) -> T) -> T {
        let mut counters = match self.counters.lock() {
            Ok(counters) => counters,
            Err(poisoned) => poisoned.into_inner(),
        };
        counters.roll_over(now);
        f(&mut counters)
    }

    fn record_success(&self) {
        self.with_counters(self.clock.now(), |c| c.processed += 1);
    }

    fn record_error(&self) {
        self.with_counters(self.clock.now(), |c| c.errors += 1);
    }

    fn touch_cycle(&self, now: DateTime<Utc>) {
        self.with_counters(now, |c| c.last_cycle_at = Some(now));
    }
}

/// `worker-<unix millis>-<6 random alphanumerics>`
pub fn generate_worker_id(now: DateTime<Utc>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();
    format!("worker-{}-{}", now.timestamp_millis(), suffix.to_lowercase())
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::TimeZone;
    use crates::domain::{
        repositories::worker_statuses::MockWorkerStatusRepository,
        value_objects::{email_jobs::QueueStats, enums::email_job_statuses::EmailJobStatus},
    };
    use serde_json::json;
    use uuid::Uuid;

    use super::*;
    use crate::usecases::email_handlers::MockJobHandler;

    struct TestClock(Mutex<DateTime<Utc>>);

    impl TestClock {
        fn at(now: DateTime<Utc>) -> Arc<Self> {
            Arc::new(Self(Mutex::new(now)))
        }

        fn advance(&self, by: chrono::Duration) {
            let mut now = self.0.lock().unwrap();
            *now += by;
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    #[derive(Default)]
    struct InMemoryJobs {
        rows: Mutex<Vec<EmailJobEntity>>,
        claim_calls: Mutex<usize>,
    }

    impl InMemoryJobs {
        fn with(rows: Vec<EmailJobEntity>) -> Arc<Self> {
            Arc::new(Self {
                rows: Mutex::new(rows),
                claim_calls: Mutex::new(0),
            })
        }

        fn get(&self, id: Uuid) -> EmailJobEntity {
            self.rows
                .lock()
                .unwrap()
                .iter()
                .find(|row| row.id == id)
                .cloned()
                .unwrap()
        }

        fn update(&self, id: Uuid, worker_id: &str, f: impl FnOnce(&mut EmailJobEntity)) -> bool {
            let mut rows = self.rows.lock().unwrap();
            match rows
                .iter_mut()
                .find(|row| row.id == id && row.worker_id.as_deref() == Some(worker_id))
            {
                Some(row) => {
                    f(row);
                    true
                }
                None => false,
            }
        }
    }

    #[async_trait]
    impl EmailJobRepository for InMemoryJobs {
        async fn enqueue_batch(
            &self,
            _jobs: Vec<crates::domain::entities::email_jobs::InsertEmailJobEntity>,
        ) -> Result<usize> {
            unimplemented!()
        }

        async fn claim_due_jobs(
            &self,
            worker_id: &str,
            limit: i64,
            now: DateTime<Utc>,
        ) -> Result<Vec<EmailJobEntity>> {
            *self.claim_calls.lock().unwrap() += 1;
            let mut rows = self.rows.lock().unwrap();
            let mut due: Vec<&mut EmailJobEntity> = rows
                .iter_mut()
                .filter(|row| {
                    EmailJobStatus::from_str(&row.status)
                        .is_some_and(|s| EmailJobStatus::claimable().contains(&s))
                        && row.scheduled_for <= now
                })
                .collect();
            due.sort_by(|a, b| {
                b.priority
                    .cmp(&a.priority)
                    .then(a.scheduled_for.cmp(&b.scheduled_for))
            });

            Ok(due
                .into_iter()
                .take(limit as usize)
                .map(|row| {
                    row.status = "processing".to_string();
                    row.started_at = Some(now);
                    row.worker_id = Some(worker_id.to_string());
                    row.clone()
                })
                .collect())
        }

        async fn mark_completed(
            &self,
            job_id: Uuid,
            worker_id: &str,
            processing_time_ms: i64,
            completed_at: DateTime<Utc>,
        ) -> Result<bool> {
            Ok(self.update(job_id, worker_id, |row| {
                row.status = "completed".to_string();
                row.completed_at = Some(completed_at);
                row.processing_time_ms = Some(processing_time_ms);
            }))
        }

        async fn mark_retrying(
            &self,
            job_id: Uuid,
            worker_id: &str,
            retry_count: i32,
            error_message: &str,
            next_run_at: DateTime<Utc>,
        ) -> Result<bool> {
            Ok(self.update(job_id, worker_id, |row| {
                row.status = "retrying".to_string();
                row.retry_count = retry_count;
                row.error_message = Some(error_message.to_string());
                row.scheduled_for = next_run_at;
                row.worker_id = None;
            }))
        }

        async fn mark_failed(
            &self,
            job_id: Uuid,
            worker_id: &str,
            retry_count: i32,
            error_message: &str,
            failed_at: DateTime<Utc>,
        ) -> Result<bool> {
            Ok(self.update(job_id, worker_id, |row| {
                row.status = "failed".to_string();
                row.retry_count = retry_count;
                row.error_message = Some(error_message.to_string());
                row.failed_at = Some(failed_at);
            }))
        }

        async fn release_stale_processing(&self, started_before: DateTime<Utc>) -> Result<usize> {
            let mut rows = self.rows.lock().unwrap();
            let mut released = 0;
            for row in rows.iter_mut().filter(|row| {
                row.status == "processing" && row.started_at.is_some_and(|t| t < started_before)
            }) {
                row.status = "pending".to_string();
                row.started_at = None;
                row.worker_id = None;
                released += 1;
            }
            Ok(released)
        }

        async fn queue_stats(&self) -> Result<QueueStats> {
            unimplemented!()
        }
    }

    fn settings() -> EmailQueue {
        EmailQueue {
            max_concurrent_jobs: 3,
            poll_interval: Duration::from_secs(30),
            stale_after: Duration::from_secs(900),
            heartbeat_interval: Duration::from_secs(30),
            template_dir: None,
        }
    }

    fn pending_job(job_type: &str, now: DateTime<Utc>) -> EmailJobEntity {
        EmailJobEntity {
            id: Uuid::new_v4(),
            job_type: job_type.to_string(),
            user_id: Uuid::new_v4(),
            user_email: "owner@shop.com".to_string(),
            status: "pending".to_string(),
            priority: 1,
            scheduled_for: now,
            retry_count: 0,
            max_retries: 3,
            error_message: None,
            created_at: now,
            started_at: None,
            completed_at: None,
            failed_at: None,
            job_data: json!({}),
            worker_id: None,
            processing_time_ms: None,
        }
    }

    fn worker(
        jobs: Arc<InMemoryJobs>,
        handler: MockJobHandler,
        clock: Arc<TestClock>,
        statuses: MockWorkerStatusRepository,
    ) -> EmailQueueWorker {
        EmailQueueWorker::new(
            "worker-test".to_string(),
            jobs,
            Arc::new(statuses),
            Arc::new(handler),
            clock,
            settings(),
        )
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn successful_job_is_completed_and_counted() {
        let clock = TestClock::at(now());
        let job = pending_job("goal_reminder", now());
        let jobs = InMemoryJobs::with(vec![job.clone()]);

        let mut handler = MockJobHandler::new();
        handler
            .expect_handle()
            .withf(|job, job_type| {
                job.user_email == "owner@shop.com" && *job_type == EmailJobType::GoalReminder
            })
            .times(1)
            .returning(|_, _| {
                Box::pin(async {
                    Ok(HandlerOutcome::Sent {
                        message_id: "msg_1".to_string(),
                    })
                })
            });

        let worker = worker(Arc::clone(&jobs), handler, clock, MockWorkerStatusRepository::new());
        let summary = worker.process_queued_jobs().await.unwrap();

        assert_eq!(summary.claimed, 1);
        assert_eq!(summary.completed, 1);
        let stored = jobs.get(job.id);
        assert_eq!(stored.status, "completed");
        assert!(stored.processing_time_ms.is_some());
        assert_eq!(stored.worker_id.as_deref(), Some("worker-test"));
        assert_eq!(worker.metrics().jobs_processed_today, 1);
    }

    #[tokio::test]
    async fn always_failing_job_is_attempted_four_times_then_failed() {
        let clock = TestClock::at(now());
        let job = pending_job("daily_digest", now());
        let jobs = InMemoryJobs::with(vec![job.clone()]);

        let mut handler = MockJobHandler::new();
        handler
            .expect_handle()
            .times(4)
            .returning(|_, _| Box::pin(async { Err(anyhow::anyhow!("provider returned 503")) }));

        let worker = worker(
            Arc::clone(&jobs),
            handler,
            Arc::clone(&clock),
            MockWorkerStatusRepository::new(),
        );

        for attempt in 1..=3 {
            let summary = worker.process_queued_jobs().await.unwrap();
            assert_eq!(summary.retried, 1);
            let stored = jobs.get(job.id);
            assert_eq!(stored.status, "retrying");
            assert_eq!(stored.retry_count, attempt);
            clock.advance(chrono::Duration::minutes(10));
        }

        let summary = worker.process_queued_jobs().await.unwrap();
        assert_eq!(summary.failed, 1);

        let stored = jobs.get(job.id);
        assert_eq!(stored.status, "failed");
        assert_eq!(stored.retry_count, 3);
        assert_eq!(stored.error_message.as_deref(), Some("provider returned 503"));
        assert!(stored.failed_at.is_some());
        assert_eq!(worker.metrics().error_count, 4);

        let summary = worker.process_queued_jobs().await.unwrap();
        assert_eq!(summary.claimed, 0);
    }

    #[tokio::test]
    async fn retry_is_not_claimed_before_its_backoff() {
        let clock = TestClock::at(now());
        let job = pending_job("goal_reminder", now());
        let jobs = InMemoryJobs::with(vec![job.clone()]);

        let mut handler = MockJobHandler::new();
        handler
            .expect_handle()
            .times(1)
            .returning(|_, _| Box::pin(async { Err(anyhow::anyhow!("timeout")) }));

        let worker = worker(
            Arc::clone(&jobs),
            handler,
            Arc::clone(&clock),
            MockWorkerStatusRepository::new(),
        );
        worker.process_queued_jobs().await.unwrap();

        assert_eq!(
            jobs.get(job.id).scheduled_for,
            now() + chrono::Duration::seconds(60)
        );

        clock.advance(chrono::Duration::seconds(30));
        let summary = worker.process_queued_jobs().await.unwrap();
        assert_eq!(summary.claimed, 0);
    }

    #[tokio::test]
    async fn unknown_job_type_fails_without_retry() {
        let clock = TestClock::at(now());
        let job = pending_job("weekly_newsletter", now());
        let jobs = InMemoryJobs::with(vec![job.clone()]);

        let mut handler = MockJobHandler::new();
        handler.expect_handle().never();

        let worker = worker(Arc::clone(&jobs), handler, clock, MockWorkerStatusRepository::new());
        let summary = worker.process_queued_jobs().await.unwrap();

        assert_eq!(summary.failed, 1);
        let stored = jobs.get(job.id);
        assert_eq!(stored.status, "failed");
        assert_eq!(stored.retry_count, 0);
    }

    #[tokio::test]
    async fn overlapping_cycle_is_skipped() {
        let clock = TestClock::at(now());
        let jobs = InMemoryJobs::with(vec![pending_job("goal_reminder", now())]);
        let worker = worker(
            Arc::clone(&jobs),
            MockJobHandler::new(),
            clock,
            MockWorkerStatusRepository::new(),
        );

        worker.processing.store(true, Ordering::Release);
        let summary = worker.process_queued_jobs().await.unwrap();

        assert!(summary.skipped);
        assert_eq!(*jobs.claim_calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn stale_processing_jobs_are_released_and_reclaimed() {
        let clock = TestClock::at(now());

        let mut abandoned = pending_job("goal_reminder", now() - chrono::Duration::hours(1));
        abandoned.status = "processing".to_string();
        abandoned.started_at = Some(now() - chrono::Duration::minutes(20));
        abandoned.worker_id = Some("worker-dead".to_string());

        let mut busy = pending_job("goal_reminder", now() - chrono::Duration::hours(1));
        busy.status = "processing".to_string();
        busy.started_at = Some(now() - chrono::Duration::minutes(5));
        busy.worker_id = Some("worker-alive".to_string());

        let jobs = InMemoryJobs::with(vec![abandoned.clone(), busy.clone()]);

        let mut handler = MockJobHandler::new();
        handler.expect_handle().times(1).returning(|_, _| {
            Box::pin(async {
                Ok(HandlerOutcome::Skipped {
                    reason: "no active goals".to_string(),
                })
            })
        });

        let worker = worker(Arc::clone(&jobs), handler, clock, MockWorkerStatusRepository::new());
        let summary = worker.process_queued_jobs().await.unwrap();

        assert_eq!(summary.released_stale, 1);
        assert_eq!(summary.completed, 1);
        assert_eq!(jobs.get(abandoned.id).status, "completed");
        assert_eq!(jobs.get(abandoned.id).worker_id.as_deref(), Some("worker-test"));
        assert_eq!(jobs.get(busy.id).status, "processing");
        assert_eq!(jobs.get(busy.id).worker_id.as_deref(), Some("worker-alive"));
    }

    #[tokio::test]
    async fn late_result_does_not_overwrite_job_reclaimed_by_another_worker() {
        let clock = TestClock::at(now());
        let job = pending_job("goal_reminder", now());
        let jobs = InMemoryJobs::with(vec![job.clone()]);

        let reclaimed = Arc::clone(&jobs);
        let mut handler = MockJobHandler::new();
        handler.expect_handle().times(1).returning(move |job, _| {
            // Another worker released and claimed the row while this send was in flight.
            if let Some(row) = reclaimed.rows.lock().unwrap().iter_mut().find(|r| r.id == job.id) {
                row.worker_id = Some("worker-other".to_string());
                row.started_at = Some(now() + chrono::Duration::minutes(16));
            }
            Box::pin(async {
                Ok(HandlerOutcome::Sent {
                    message_id: "msg_late".to_string(),
                })
            })
        });

        let worker = worker(Arc::clone(&jobs), handler, clock, MockWorkerStatusRepository::new());
        worker.process_queued_jobs().await.unwrap();

        let stored = jobs.get(job.id);
        assert_eq!(stored.status, "processing");
        assert_eq!(stored.worker_id.as_deref(), Some("worker-other"));
        assert_eq!(stored.completed_at, None);
    }

    #[tokio::test]
    async fn shutdown_writes_stopped_and_refuses_new_cycles() {
        let clock = TestClock::at(now());
        let jobs = InMemoryJobs::with(vec![pending_job("goal_reminder", now())]);

        let mut statuses = MockWorkerStatusRepository::new();
        statuses
            .expect_upsert()
            .withf(|row| row.worker_id == "worker-test" && row.status == "stopped")
            .times(1)
            .returning(|_| Box::pin(async { Ok(()) }));

        let worker = worker(Arc::clone(&jobs), MockJobHandler::new(), clock, statuses);
        worker.shutdown().await.unwrap();

        let summary = worker.process_queued_jobs().await.unwrap();
        assert!(summary.skipped);
        assert_eq!(worker.metrics().status, WorkerState::Stopped);
    }

    #[tokio::test]
    async fn counters_reset_on_utc_day_change() {
        let clock = TestClock::at(now());
        let jobs = InMemoryJobs::with(vec![pending_job("goal_reminder", now())]);

        let mut handler = MockJobHandler::new();
        handler.expect_handle().returning(|_, _| {
            Box::pin(async {
                Ok(HandlerOutcome::Sent {
                    message_id: "msg".to_string(),
                })
            })
        });

        let mut statuses = MockWorkerStatusRepository::new();
        statuses
            .expect_upsert()
            .withf(|row| row.jobs_processed_today == 0 && row.status == "idle")
            .times(1)
            .returning(|_| Box::pin(async { Ok(()) }));

        let worker = worker(Arc::clone(&jobs), handler, Arc::clone(&clock), statuses);
        worker.process_queued_jobs().await.unwrap();
        assert_eq!(worker.metrics().jobs_processed_today, 1);

        clock.advance(chrono::Duration::days(1));
        worker.heartbeat().await.unwrap();
    }

    #[test]
    fn worker_id_format() {
        let id = generate_worker_id(now());
        let parts: Vec<&str> = id.split('-').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "worker");
        assert_eq!(parts[1], now().timestamp_millis().to_string());
        assert_eq!(parts[2].len(), 6);
        assert!(parts[2].chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
