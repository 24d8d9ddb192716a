use std::{collections::HashMap, path::Path};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::domain::value_objects::enums::email_job_types::EmailJobType;

#[derive(Debug, Clone, PartialEq)]
pub struct EmailTemplate {
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[derive(Debug, Clone)]
enum TemplateValue {
    Text(String),
    Fragment { html: String, text: String },
}

/// Placeholder values for one render. Plain values are HTML-escaped in the HTML body;
/// fragments are inserted as given.
#[derive(Debug, Clone, Default)]
pub struct TemplateValues {
    values: HashMap<String, TemplateValue>,
}

impl TemplateValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, key: &str, value: impl Into<String>) -> Self {
        self.values
            .insert(key.to_string(), TemplateValue::Text(value.into()));
        self
    }

    pub fn fragment(mut self, key: &str, html: impl Into<String>, text: impl Into<String>) -> Self {
        self.values.insert(
            key.to_string(),
            TemplateValue::Fragment {
                html: html.into(),
                text: text.into(),
            },
        );
        self
    }

    fn html_value(&self, key: &str) -> String {
        match self.values.get(key) {
            Some(TemplateValue::Text(value)) => escape_html(value),
            Some(TemplateValue::Fragment { html, .. }) => html.clone(),
            None => String::new(),
        }
    }

    fn text_value(&self, key: &str) -> String {
        match self.values.get(key) {
            Some(TemplateValue::Text(value)) => value.clone(),
            Some(TemplateValue::Fragment { text, .. }) => text.clone(),
            None => String::new(),
        }
    }
}

pub struct TemplateStore {
    templates: HashMap<EmailJobType, EmailTemplate>,
}

const ALL_TYPES: [EmailJobType; 3] = [
    EmailJobType::DailyDigest,
    EmailJobType::GoalReminder,
    EmailJobType::MilestoneAlert,
];

impl TemplateStore {
    pub fn builtin() -> Self {
        let templates = ALL_TYPES
            .iter()
            .map(|job_type| (*job_type, builtin_template(*job_type)))
            .collect();
        Self { templates }
    }

    /// Loads `<job_type>.html`, `<job_type>.txt` and `<job_type>.subject` from `dir`.
    /// Any file that is missing falls back to the built-in version.
    pub async fn load(dir: Option<&Path>) -> Result<Self> {
        let mut store = Self::builtin();
        let Some(dir) = dir else {
            info!("mail: using built-in email templates");
            return Ok(store);
        };

        for job_type in ALL_TYPES {
            let template = store
                .templates
                .get_mut(&job_type)
                .context("built-in template missing")?;

            if let Some(html) = read_optional(dir, job_type, "html").await? {
                template.html = html;
            }
            if let Some(text) = read_optional(dir, job_type, "txt").await? {
                template.text = text;
            }
            if let Some(subject) = read_optional(dir, job_type, "subject").await? {
                template.subject = subject.trim().to_string();
            }
        }

        info!(template_dir = %dir.display(), "mail: email templates loaded");
        Ok(store)
    }

    pub fn render(&self, job_type: EmailJobType, values: &TemplateValues) -> Result<RenderedEmail> {
        let template = self
            .templates
            .get(&job_type)
            .with_context(|| format!("no template registered for {job_type}"))?;

        Ok(RenderedEmail {
            subject: substitute(&template.subject, |key| values.text_value(key)),
            html: substitute(&template.html, |key| values.html_value(key)),
            text: substitute(&template.text, |key| values.text_value(key)),
        })
    }
}

async fn read_optional(dir: &Path, job_type: EmailJobType, extension: &str) -> Result<Option<String>> {
    let path = dir.join(format!("{}.{}", job_type.as_str(), extension));
    match tokio::fs::read_to_string(&path).await {
        Ok(content) => Ok(Some(content)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "mail: template file missing, using built-in");
            Ok(None)
        }
        Err(err) => Err(err).with_context(|| format!("failed to read template {}", path.display())),
    }
}

/// Replaces every `{{ key }}` with `lookup(key)`. Unterminated braces are copied verbatim.
fn substitute(template: &str, lookup: impl Fn(&str) -> String) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        output.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        match after_open.find("}}") {
            Some(end) => {
                output.push_str(&lookup(after_open[..end].trim()));
                rest = &after_open[end + 2..];
            }
            None => {
                output.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    output.push_str(rest);
    output
}

pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn builtin_template(job_type: EmailJobType) -> EmailTemplate {
    match job_type {
        EmailJobType::DailyDigest => EmailTemplate {
            subject: "Your Bizzin daily digest for {{date}}".to_string(),
            html: r#"<html><body style="font-family:sans-serif">
<h2>Good morning, {{first_name}}</h2>
<h3>Today's journal prompt</h3>
<p><em>{{journal_prompt}}</em></p>
<h3>Goals</h3>
<p>{{goal_summary}}</p>
<h3>Insights</h3>
{{insights}}
<h3>Upcoming milestones</h3>
{{milestones}}
<p style="color:#888">Mood lately: {{sentiment}}</p>
</body></html>"#
                .to_string(),
            text: "Good morning, {{first_name}}\n\nToday's journal prompt:\n{{journal_prompt}}\n\nGoals:\n{{goal_summary}}\n\nInsights:\n{{insights}}\n\nUpcoming milestones:\n{{milestones}}\n\nMood lately: {{sentiment}}\n"
                .to_string(),
        },
        EmailJobType::GoalReminder => EmailTemplate {
            subject: "{{first_name}}, you have {{goal_count}} {{goal_noun}} in progress".to_string(),
            html: r#"<html><body style="font-family:sans-serif">
<h2>Keep going, {{first_name}}</h2>
<p>These goals are still in progress:</p>
{{goals}}
</body></html>"#
                .to_string(),
            text: "Keep going, {{first_name}}\n\nThese goals are still in progress:\n{{goals}}\n"
                .to_string(),
        },
        EmailJobType::MilestoneAlert => EmailTemplate {
            subject: "{{milestone_count}} {{milestone_noun}} due soon".to_string(),
            html: r#"<html><body style="font-family:sans-serif">
<h2>Heads up, {{first_name}}</h2>
<p>These milestones are due soon:</p>
{{milestones}}
</body></html>"#
                .to_string(),
            text: "Heads up, {{first_name}}\n\nThese milestones are due soon:\n{{milestones}}\n"
                .to_string(),
        },
    }
}

/// Renders a list as an escaped `<ul>` fragment plus a dashed plain-text list.
pub fn list_fragment<I, S>(items: I) -> (String, String)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut html = String::from("<ul>");
    let mut text = String::new();
    for item in items {
        let item = item.as_ref();
        html.push_str("<li>");
        html.push_str(&escape_html(item));
        html.push_str("</li>");
        text.push_str("- ");
        text.push_str(item);
        text.push('\n');
    }
    html.push_str("</ul>");
    (html, text.trim_end().to_string())
}
