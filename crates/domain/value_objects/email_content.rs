use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::domain::{
    entities::{
        daily_email_contents::UpsertDailyEmailContentEntity, goals::GoalEntity,
        journal_entries::JournalEntryEntity, milestones::MilestoneEntity,
    },
    value_objects::enums::sentiments::{Sentiment, SentimentTrend},
};

pub const UPCOMING_WINDOW_DAYS: i64 = 7;
const TREND_THRESHOLD: f64 = 0.1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SentimentSummary {
    pub overall: Sentiment,
    pub trend: SentimentTrend,
}

impl SentimentSummary {
    pub fn prompt_key(&self) -> String {
        format!("{}_{}", self.overall, self.trend)
    }
}

/// Classifies recent journal entries. Overall is the strict plurality bucket (ties fall back
/// to neutral); the trend compares the positive share of the newer half against the older half.
pub fn analyze_sentiment(entries: &[JournalEntryEntity]) -> SentimentSummary {
    let mut ordered: Vec<&JournalEntryEntity> = entries.iter().collect();
    ordered.sort_by_key(|entry| entry.created_at);
    let labels: Vec<Sentiment> = ordered
        .iter()
        .map(|entry| Sentiment::from_label(entry.sentiment.as_deref()))
        .collect();

    SentimentSummary {
        overall: overall_sentiment(&labels),
        trend: sentiment_trend(&labels),
    }
}

fn overall_sentiment(labels: &[Sentiment]) -> Sentiment {
    let count = |wanted: Sentiment| labels.iter().filter(|s| **s == wanted).count();
    let positive = count(Sentiment::Positive);
    let negative = count(Sentiment::Negative);
    let neutral = count(Sentiment::Neutral);

    if positive > negative && positive > neutral {
        Sentiment::Positive
    } else if negative > positive && negative > neutral {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    }
}

fn sentiment_trend(labels: &[Sentiment]) -> SentimentTrend {
    if labels.len() < 2 {
        return SentimentTrend::Stable;
    }
    let (older, newer) = labels.split_at(labels.len() / 2);
    let positive_share = |half: &[Sentiment]| {
        half.iter().filter(|s| **s == Sentiment::Positive).count() as f64 / half.len() as f64
    };

    let delta = positive_share(newer) - positive_share(older);
    if delta > TREND_THRESHOLD {
        SentimentTrend::Improving
    } else if delta < -TREND_THRESHOLD {
        SentimentTrend::Declining
    } else {
        SentimentTrend::Stable
    }
}

const PROMPTS_POSITIVE_IMPROVING: &[&str] = &[
    "Your momentum is building. What decision this week made the biggest difference?",
    "Things are looking up. Which habit do you want to lock in while energy is high?",
];
const PROMPTS_POSITIVE_STABLE: &[&str] = &[
    "You've been consistently upbeat. What keeps your business steady right now?",
    "What is one win from yesterday you could repeat today?",
];
const PROMPTS_POSITIVE_DECLINING: &[&str] = &[
    "Overall you're in a good place, but something shifted lately. What changed?",
    "What drained your energy this week, and what could you hand off?",
];
const PROMPTS_NEUTRAL_IMPROVING: &[&str] = &[
    "Your outlook is brightening. What small change helped the most?",
    "What would make today a clear step forward?",
];
const PROMPTS_NEUTRAL_STABLE: &[&str] = &[
    "What is the single most important thing to move forward today?",
    "Which customer conversation would teach you the most this week?",
    "What are you avoiding, and what is the smallest first step?",
];
const PROMPTS_NEUTRAL_DECLINING: &[&str] = &[
    "Recent days have felt heavier. What support would help you most right now?",
    "Which task keeps slipping, and what is blocking it?",
];
const PROMPTS_NEGATIVE_IMPROVING: &[&str] = &[
    "It's been tough, but you're turning a corner. What is working again?",
    "Name one thing that went better than expected recently.",
];
const PROMPTS_NEGATIVE_STABLE: &[&str] = &[
    "Running a business is hard. What is one thing you can take off your plate today?",
    "Who could you reach out to for advice this week?",
];
const PROMPTS_NEGATIVE_DECLINING: &[&str] = &[
    "Things have been rough lately. What would a restful, realistic day look like?",
    "Write down three things within your control today.",
];

/// Journal prompt candidates keyed by `{overall}_{trend}`; unknown keys use `neutral_stable`.
pub fn journal_prompt_options(key: &str) -> &'static [&'static str] {
    match key {
        "positive_improving" => PROMPTS_POSITIVE_IMPROVING,
        "positive_stable" => PROMPTS_POSITIVE_STABLE,
        "positive_declining" => PROMPTS_POSITIVE_DECLINING,
        "neutral_improving" => PROMPTS_NEUTRAL_IMPROVING,
        "neutral_declining" => PROMPTS_NEUTRAL_DECLINING,
        "negative_improving" => PROMPTS_NEGATIVE_IMPROVING,
        "negative_stable" => PROMPTS_NEGATIVE_STABLE,
        "negative_declining" => PROMPTS_NEGATIVE_DECLINING,
        _ => PROMPTS_NEUTRAL_STABLE,
    }
}

pub fn goal_summary(goals: &[GoalEntity]) -> String {
    if goals.is_empty() {
        return "You haven't set any goals yet. Setting one clear goal today is a great first step."
            .to_string();
    }

    let total = goals.len();
    let completed = goals.iter().filter(|g| g.is_completed()).count();
    let active: Vec<&GoalEntity> = goals.iter().filter(|g| g.is_active()).collect();
    let completion_pct = completed * 100 / total;

    if active.is_empty() {
        return format!(
            "You've completed {completed} of {total} goals ({completion_pct}%). Time to set your next one."
        );
    }

    let average_progress =
        active.iter().map(|g| i64::from(g.progress.clamp(0, 100))).sum::<i64>() / active.len() as i64;
    format!(
        "You have {} active goal{} averaging {average_progress}% progress, and {completed} of {total} goals completed ({completion_pct}%).",
        active.len(),
        if active.len() == 1 { "" } else { "s" },
    )
}

pub fn business_insights(
    goals: &[GoalEntity],
    sentiment: &SentimentSummary,
    now: DateTime<Utc>,
) -> Vec<String> {
    let mut insights = Vec::new();

    if !goals.is_empty() {
        let completed = goals.iter().filter(|g| g.is_completed()).count();
        let ratio = completed as f64 / goals.len() as f64;
        if ratio >= 0.7 {
            insights.push(
                "Strong execution: most of your goals are complete. Consider raising the bar."
                    .to_string(),
            );
        } else if ratio <= 0.3 && goals.len() >= 3 {
            insights.push(
                "Many goals are still open. Focusing on fewer at once can speed things up."
                    .to_string(),
            );
        }

        let horizon = now + Duration::days(UPCOMING_WINDOW_DAYS);
        let due_soon = goals
            .iter()
            .filter(|g| !g.is_completed())
            .filter(|g| g.deadline.is_some_and(|d| d >= now && d <= horizon))
            .count();
        if due_soon > 0 {
            insights.push(format!(
                "{due_soon} goal{} due within the next {UPCOMING_WINDOW_DAYS} days.",
                if due_soon == 1 { " is" } else { "s are" }
            ));
        }

        let mut categories: BTreeMap<&str, usize> = BTreeMap::new();
        for category in goals.iter().filter_map(|g| g.category.as_deref()) {
            *categories.entry(category).or_default() += 1;
        }
        if let Some((category, count)) = categories.iter().max_by_key(|(_, count)| **count) {
            if *count * 2 > goals.len() {
                insights.push(format!("Most of your goals focus on {category}."));
            }
        }
    }

    match sentiment.trend {
        SentimentTrend::Improving => insights
            .push("Your journal entries are trending more positive. Keep it up.".to_string()),
        SentimentTrend::Declining => insights.push(
            "Your recent journal entries are less positive than before. Make room for a break."
                .to_string(),
        ),
        SentimentTrend::Stable => {}
    }

    insights
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MilestoneReminder {
    pub milestone_id: Uuid,
    pub title: String,
    pub due_date: DateTime<Utc>,
    pub days_until_due: i64,
    pub overdue: bool,
}

/// Incomplete milestones due within the upcoming window (overdue ones included), soonest first.
pub fn milestone_reminders(milestones: &[MilestoneEntity], now: DateTime<Utc>) -> Vec<MilestoneReminder> {
    let horizon = now + Duration::days(UPCOMING_WINDOW_DAYS);
    let mut reminders: Vec<MilestoneReminder> = milestones
        .iter()
        .filter(|m| !m.completed)
        .filter_map(|m| m.due_date.filter(|due| *due <= horizon).map(|due| (m, due)))
        .map(|(m, due)| MilestoneReminder {
            milestone_id: m.id,
            title: m.title.clone(),
            due_date: due,
            days_until_due: (due - now).num_days(),
            overdue: due < now,
        })
        .collect();
    reminders.sort_by_key(|r| r.due_date);
    reminders
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyEmailContent {
    pub user_id: Uuid,
    pub content_date: NaiveDate,
    pub journal_prompt: String,
    pub goal_summary: String,
    pub business_insights: Vec<String>,
    pub milestone_reminders: Vec<MilestoneReminder>,
    pub sentiment: SentimentSummary,
}

impl DailyEmailContent {
    pub fn to_upsert_entity(&self, now: DateTime<Utc>) -> UpsertDailyEmailContentEntity {
        UpsertDailyEmailContentEntity {
            user_id: self.user_id,
            content_date: self.content_date,
            journal_prompt: self.journal_prompt.clone(),
            goal_summary: self.goal_summary.clone(),
            business_insights: json!(self.business_insights),
            milestone_reminders: json!(self.milestone_reminders),
            sentiment_overall: self.sentiment.overall.to_string(),
            sentiment_trend: self.sentiment.trend.to_string(),
            updated_at: now,
        }
    }
}
