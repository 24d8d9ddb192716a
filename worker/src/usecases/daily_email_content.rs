use std::sync::Arc;

use anyhow::Result;
use chrono::Duration;
use crates::domain::{
    repositories::{
        daily_email_contents::DailyEmailContentRepository, user_activity::UserActivityRepository,
    },
    value_objects::{
        clock::Clock,
        email_content::{
            DailyEmailContent, UPCOMING_WINDOW_DAYS, analyze_sentiment, business_insights,
            goal_summary, journal_prompt_options, milestone_reminders,
        },
    },
};
use rand::seq::SliceRandom;
use tracing::{error, info};
use uuid::Uuid;

const JOURNAL_LOOKBACK_DAYS: i64 = 14;
const JOURNAL_ENTRY_LIMIT: i64 = 20;

/// Builds the per-user daily bundle and stores it keyed by (user, UTC date).
pub struct DailyEmailContentGenerator {
    activity_repo: Arc<dyn UserActivityRepository + Send + Sync>,
    content_repo: Arc<dyn DailyEmailContentRepository + Send + Sync>,
    clock: Arc<dyn Clock>,
}

impl DailyEmailContentGenerator {
    pub fn new(
        activity_repo: Arc<dyn UserActivityRepository + Send + Sync>,
        content_repo: Arc<dyn DailyEmailContentRepository + Send + Sync>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            activity_repo,
            content_repo,
            clock,
        }
    }

    pub async fn generate(&self, user_id: Uuid) -> Result<DailyEmailContent> {
        let now = self.clock.now();

        let goals = self.activity_repo.list_goals(user_id).await?;
        let milestones = self
            .activity_repo
            .list_open_milestones_due_before(user_id, now + Duration::days(UPCOMING_WINDOW_DAYS))
            .await?;
        let entries = self
            .activity_repo
            .list_journal_entries_since(
                user_id,
                now - Duration::days(JOURNAL_LOOKBACK_DAYS),
                JOURNAL_ENTRY_LIMIT,
            )
            .await?;

        let sentiment = analyze_sentiment(&entries);
        let journal_prompt = journal_prompt_options(&sentiment.prompt_key())
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or("What is one thing you want to move forward today?")
            .to_string();

        let content = DailyEmailContent {
            user_id,
            content_date: now.date_naive(),
            journal_prompt,
            goal_summary: goal_summary(&goals),
            business_insights: business_insights(&goals, &sentiment, now),
            milestone_reminders: milestone_reminders(&milestones, now),
            sentiment,
        };

        self.content_repo
            .upsert(content.to_upsert_entity(now))
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "daily_email_content: failed to store content");
                err
            })?;

        info!(
            %user_id,
            content_date = %content.content_date,
            insights = content.business_insights.len(),
            milestones = content.milestone_reminders.len(),
            sentiment = %content.sentiment.prompt_key(),
            "daily_email_content: content generated"
        );
        Ok(content)
    }
}
