use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Duration;
use crates::{
    domain::{
        entities::{
            email_analytics::InsertEmailAnalyticsEntity, email_jobs::EmailJobEntity,
            profiles::ProfileEntity,
        },
        repositories::{
            email_analytics::EmailAnalyticsRepository, profiles::ProfileRepository,
            user_activity::UserActivityRepository,
        },
        value_objects::{
            clock::Clock,
            email_content::{UPCOMING_WINDOW_DAYS, milestone_reminders},
            email_jobs::{GoalReminderData, MilestoneAlertData},
            enums::email_job_types::EmailJobType,
        },
    },
    mail::{
        MailTransport, OutgoingEmail,
        templates::{RenderedEmail, TemplateStore, TemplateValues, list_fragment},
    },
};
use mockall::automock;
use serde_json::json;
use tracing::{info, warn};

use super::daily_email_content::DailyEmailContentGenerator;

#[derive(Debug, Clone, PartialEq)]
pub enum HandlerOutcome {
    Sent { message_id: String },
    Skipped { reason: String },
}

/// Executes one claimed job. An `Err` counts as a failed attempt and goes through retry.
#[async_trait]
#[automock]
pub trait JobHandler {
    async fn handle(&self, job: &EmailJobEntity, job_type: EmailJobType) -> Result<HandlerOutcome>;
}

pub struct EmailJobHandlers {
    profile_repo: Arc<dyn ProfileRepository + Send + Sync>,
    activity_repo: Arc<dyn UserActivityRepository + Send + Sync>,
    analytics_repo: Arc<dyn EmailAnalyticsRepository + Send + Sync>,
    content: Arc<DailyEmailContentGenerator>,
    transport: Arc<dyn MailTransport + Send + Sync>,
    templates: Arc<TemplateStore>,
    clock: Arc<dyn Clock>,
}

impl EmailJobHandlers {
    pub fn new(
        profile_repo: Arc<dyn ProfileRepository + Send + Sync>,
        activity_repo: Arc<dyn UserActivityRepository + Send + Sync>,
        analytics_repo: Arc<dyn EmailAnalyticsRepository + Send + Sync>,
        content: Arc<DailyEmailContentGenerator>,
        transport: Arc<dyn MailTransport + Send + Sync>,
        templates: Arc<TemplateStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            profile_repo,
            activity_repo,
            analytics_repo,
            content,
            transport,
            templates,
            clock,
        }
    }

    async fn daily_digest(&self, job: &EmailJobEntity) -> Result<HandlerOutcome> {
        let profile = self.profile_repo.find_by_id(job.user_id).await?;
        let content = self.content.generate(job.user_id).await?;

        let (insights_html, insights_text) = if content.business_insights.is_empty() {
            list_fragment(["Keep logging progress to unlock insights."])
        } else {
            list_fragment(&content.business_insights)
        };
        let milestone_lines: Vec<String> = content
            .milestone_reminders
            .iter()
            .map(|m| {
                if m.overdue {
                    format!("{} (overdue)", m.title)
                } else {
                    format!("{} (due in {} days)", m.title, m.days_until_due)
                }
            })
            .collect();
        let (milestones_html, milestones_text) = if milestone_lines.is_empty() {
            list_fragment(["Nothing due this week."])
        } else {
            list_fragment(&milestone_lines)
        };

        let values = TemplateValues::new()
            .text("first_name", first_name(profile.as_ref()))
            .text("date", content.content_date.format("%B %-d, %Y").to_string())
            .text("journal_prompt", content.journal_prompt.clone())
            .text("goal_summary", content.goal_summary.clone())
            .fragment("insights", insights_html, insights_text)
            .fragment("milestones", milestones_html, milestones_text)
            .text("sentiment", content.sentiment.overall.to_string());

        let rendered = self.templates.render(EmailJobType::DailyDigest, &values)?;
        self.deliver(job, EmailJobType::DailyDigest, rendered).await
    }

    async fn goal_reminder(&self, job: &EmailJobEntity) -> Result<HandlerOutcome> {
        let data: GoalReminderData =
            serde_json::from_value(job.job_data.clone()).context("invalid goal_reminder job_data")?;

        let goals: Vec<_> = self
            .activity_repo
            .list_goals(job.user_id)
            .await?
            .into_iter()
            .filter(|g| g.is_active())
            .filter(|g| data.goal_id.is_none_or(|id| g.id == id))
            .collect();

        if goals.is_empty() {
            return Ok(HandlerOutcome::Skipped {
                reason: "no active goals".to_string(),
            });
        }

        let profile = self.profile_repo.find_by_id(job.user_id).await?;
        let lines: Vec<String> = goals
            .iter()
            .map(|g| format!("{} ({}%)", g.title, g.progress))
            .collect();
        let (goals_html, goals_text) = list_fragment(&lines);

        let values = TemplateValues::new()
            .text("first_name", first_name(profile.as_ref()))
            .text("goal_count", goals.len().to_string())
            .text("goal_noun", noun(goals.len(), "goal", "goals"))
            .fragment("goals", goals_html, goals_text);

        let rendered = self.templates.render(EmailJobType::GoalReminder, &values)?;
        self.deliver(job, EmailJobType::GoalReminder, rendered).await
    }

    async fn milestone_alert(&self, job: &EmailJobEntity) -> Result<HandlerOutcome> {
        let data: MilestoneAlertData = serde_json::from_value(job.job_data.clone())
            .context("invalid milestone_alert job_data")?;
        let now = self.clock.now();

        let milestones: Vec<_> = self
            .activity_repo
            .list_open_milestones_due_before(job.user_id, now + Duration::days(UPCOMING_WINDOW_DAYS))
            .await?
            .into_iter()
            .filter(|m| data.milestone_id.is_none_or(|id| m.id == id))
            .collect();
        let reminders = milestone_reminders(&milestones, now);

        if reminders.is_empty() {
            return Ok(HandlerOutcome::Skipped {
                reason: "no milestones due".to_string(),
            });
        }

        let profile = self.profile_repo.find_by_id(job.user_id).await?;
        let lines: Vec<String> = reminders
            .iter()
            .map(|m| format!("{} (due {})", m.title, m.due_date.format("%b %-d")))
            .collect();
        let (milestones_html, milestones_text) = list_fragment(&lines);

        let values = TemplateValues::new()
            .text("first_name", first_name(profile.as_ref()))
            .text("milestone_count", reminders.len().to_string())
            .text("milestone_noun", noun(reminders.len(), "milestone", "milestones"))
            .fragment("milestones", milestones_html, milestones_text);

        let rendered = self.templates.render(EmailJobType::MilestoneAlert, &values)?;
        self.deliver(job, EmailJobType::MilestoneAlert, rendered).await
    }

    async fn deliver(
        &self,
        job: &EmailJobEntity,
        job_type: EmailJobType,
        rendered: RenderedEmail,
    ) -> Result<HandlerOutcome> {
        let message_id = self
            .transport
            .send(OutgoingEmail {
                to: job.user_email.clone(),
                subject: rendered.subject,
                html: rendered.html,
                text: rendered.text,
            })
            .await?;

        info!(
            job_id = %job.id,
            %job_type,
            %message_id,
            transport = self.transport.transport_name(),
            "email_handlers: email sent"
        );

        let event = InsertEmailAnalyticsEntity {
            user_id: job.user_id,
            email_job_id: Some(job.id),
            email_type: job_type.to_string(),
            event: "sent".to_string(),
            metadata: json!({
                "message_id": message_id,
                "transport": self.transport.transport_name(),
            }),
        };
        if let Err(err) = self.analytics_repo.record(event).await {
            warn!(job_id = %job.id, db_error = ?err, "email_handlers: failed to record analytics");
        }

        Ok(HandlerOutcome::Sent { message_id })
    }
}

#[async_trait]
impl JobHandler for EmailJobHandlers {
    async fn handle(&self, job: &EmailJobEntity, job_type: EmailJobType) -> Result<HandlerOutcome> {
        match job_type {
            EmailJobType::DailyDigest => self.daily_digest(job).await,
            EmailJobType::GoalReminder => self.goal_reminder(job).await,
            EmailJobType::MilestoneAlert => self.milestone_alert(job).await,
        }
    }
}

fn noun(count: usize, one: &'static str, many: &'static str) -> &'static str {
    if count == 1 { one } else { many }
}

fn first_name(profile: Option<&ProfileEntity>) -> String {
    profile
        .and_then(|p| p.first_name.as_deref())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or("there")
        .to_string()
}
