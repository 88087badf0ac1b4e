use crate::ai::prompts;
use crate::analyzer::period::{Period, parse_iso_date};
use crate::context::AppContext;
use crate::db::checkin::{MetricInput, MetricValue};
use crate::error::{AppError, AppResult};
use anyhow::Context;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

pub const MAX_CONTEXT_BLURB_CHARS: usize = 500;

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitRequest {
    pub period_date: String,
    #[serde(default)]
    pub values: Vec<MetricInput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportRequest {
    #[serde(default)]
    pub period_date: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricComparison {
    pub key: String,
    pub label: String,
    pub unit: Option<String>,
    pub this_week: f64,
    pub last_week: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricReport {
    pub period_date: NaiveDate,
    pub report_md: String,
    pub metrics: Vec<MetricComparison>,
    pub used_fallback: bool,
}

pub fn submit(ctx: &AppContext, owner: &str, request: SubmitRequest) -> AppResult<Vec<MetricValue>> {
    let period_date = parse_iso_date("period_date", &request.period_date)?;
    if request.values.is_empty() {
        return Err(AppError::validation("values must contain at least one metric"));
    }
    for input in &request.values {
        if input.key.trim().is_empty() {
            return Err(AppError::validation("metric key must not be empty"));
        }
        if !input.value.is_finite() {
            return Err(AppError::validation(format!(
                "metric {} must have a finite value",
                input.key
            )));
        }
    }

    let saved = ctx
        .open_database()?
        .record_metric_values(owner, period_date, &request.values)?;
    info!(owner, period = %period_date, metrics = saved.len(), "metric values recorded");

    Ok(saved)
}

/// Pairs each current value with the previous period's; missing previous
/// values count as zero.
pub fn compare_metrics(current: &[MetricValue], previous: &[MetricValue]) -> Vec<MetricComparison> {
    let previous = previous
        .iter()
        .map(|value| (value.key.as_str(), value.value))
        .collect::<HashMap<_, _>>();

    current
        .iter()
        .map(|value| MetricComparison {
            key: value.key.clone(),
            label: value.label.clone(),
            unit: value.unit.clone(),
            this_week: value.value,
            last_week: previous.get(value.key.as_str()).copied().unwrap_or(0.0),
        })
        .collect()
}

pub async fn report(ctx: &AppContext, owner: &str, request: ReportRequest) -> AppResult<MetricReport> {
    let period_date = match request.period_date.as_deref() {
        Some(raw) => parse_iso_date("period_date", raw)?,
        None => Period::current().week_ending(),
    };

    let metrics = {
        let database = ctx.open_database()?;
        let current = database.metric_values_for(owner, period_date)?;
        let previous = database.metric_values_for(owner, period_date - Duration::days(7))?;
        compare_metrics(&current, &previous)
    };
    if metrics.is_empty() {
        return Err(AppError::validation(format!(
            "no metric values recorded for {period_date}"
        )));
    }

    let payload = serde_json::to_string(&metrics).context("Failed to serialize metrics payload")?;
    let generated = ctx
        .summarizer
        .generate_text(prompts::METRICS_ANALYST, &payload)
        .await?;

    ctx.open_database()?
        .upsert_weekly_report(owner, period_date, &generated.text)?;
    info!(owner, period = %period_date, "weekly metrics report stored");

    Ok(MetricReport {
        period_date,
        report_md: generated.text.clone(),
        metrics,
        used_fallback: generated.used_fallback(),
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectType {
    Creator,
    Saas,
    #[default]
    Developer,
    Student,
    Custom,
}

impl ProjectType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "creator" => Some(ProjectType::Creator),
            "saas" => Some(ProjectType::Saas),
            "developer" => Some(ProjectType::Developer),
            "student" => Some(ProjectType::Student),
            "custom" => Some(ProjectType::Custom),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProjectType::Creator => "creator",
            ProjectType::Saas => "saas",
            ProjectType::Developer => "developer",
            ProjectType::Student => "student",
            ProjectType::Custom => "custom",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SuggestRequest {
    #[serde(default)]
    pub project_type: Option<ProjectType>,
    #[serde(default)]
    pub context_blurb: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SuggestedMetric {
    pub key: &'static str,
    pub label: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<&'static str>,
}

const fn metric(key: &'static str, label: &'static str) -> SuggestedMetric {
    SuggestedMetric {
        key,
        label,
        unit: None,
    }
}

const fn metric_in(key: &'static str, label: &'static str, unit: &'static str) -> SuggestedMetric {
    SuggestedMetric {
        key,
        label,
        unit: Some(unit),
    }
}

const KEYWORD_METRICS: [(&str, SuggestedMetric); 8] = [
    ("revenue", metric_in("revenue", "Revenue", "$")),
    ("youtube", metric("views", "YouTube Views")),
    ("youtube", metric("subs", "YouTube Subscribers")),
    ("open source", metric("stars", "Stars")),
    ("open source", metric("forks", "Forks")),
    ("fitness", metric("workouts", "Workouts")),
    ("fitness", metric("minutes", "Active Minutes")),
    ("fitness", metric_in("weight", "Weight", "lbs")),
];

fn base_metrics(project_type: ProjectType) -> &'static [SuggestedMetric] {
    const CREATOR: [SuggestedMetric; 4] = [
        metric("followers", "Followers"),
        metric("views", "Views"),
        metric("subs", "Subscribers"),
        metric_in("revenue", "Revenue", "$"),
    ];
    const SAAS: [SuggestedMetric; 4] = [
        metric_in("mrr", "MRR", "$"),
        metric("active_users", "Active Users"),
        metric_in("churn_rate", "Churn Rate", "%"),
        metric_in("growth_rate", "Growth Rate", "%"),
    ];
    const DEVELOPER: [SuggestedMetric; 4] = [
        metric("commits", "Commits"),
        metric("prs_merged", "PRs Merged"),
        metric("stars", "Repo Stars"),
        metric("downloads", "Package Downloads"),
    ];
    const STUDENT: [SuggestedMetric; 4] = [
        metric("courses_completed", "Courses Completed"),
        metric("hours_studied", "Hours Studied"),
        metric("grades_avg", "Grade Average"),
        metric("projects_done", "Projects Completed"),
    ];

    match project_type {
        ProjectType::Creator => &CREATOR,
        ProjectType::Saas => &SAAS,
        ProjectType::Developer => &DEVELOPER,
        ProjectType::Student => &STUDENT,
        ProjectType::Custom => &[],
    }
}

/// Base metrics for the project type plus keyword matches from the blurb.
/// The first metric seen for a key wins.
pub fn suggest(request: &SuggestRequest) -> AppResult<Vec<SuggestedMetric>> {
    let blurb = request.context_blurb.as_deref().unwrap_or_default();
    if blurb.chars().count() > MAX_CONTEXT_BLURB_CHARS {
        return Err(AppError::validation(format!(
            "context_blurb must be at most {MAX_CONTEXT_BLURB_CHARS} characters"
        )));
    }

    let text = blurb.to_lowercase();
    let extras = KEYWORD_METRICS
        .iter()
        .filter(|(keyword, _)| text.contains(keyword))
        .map(|(_, metric)| *metric);

    let mut suggested: Vec<SuggestedMetric> = Vec::new();
    for metric in base_metrics(request.project_type.unwrap_or_default())
        .iter()
        .copied()
        .chain(extras)
    {
        if !suggested.iter().any(|existing| existing.key == metric.key) {
            suggested.push(metric);
        }
    }

    Ok(suggested)
}
