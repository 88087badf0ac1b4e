use crate::ai::prompts;
use crate::analyzer::period::parse_iso_date;
use crate::context::AppContext;
use crate::db::newsletter::{NewsletterPost, NewsletterSource};
use crate::error::{AppError, AppResult};
use crate::journal::check_length;
use anyhow::Context;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use url::Url;

const MAX_SOURCE_TITLE_CHARS: usize = 120;
const RESEARCH_WINDOW_DAYS: i64 = 21;
const VOICE_SAMPLES: usize = 2;
const SUBJECT_OPTIONS: usize = 3;
const DRAFT_MARKER: &str = "DRAFT:";
const UNTITLED: &str = "Untitled";

#[derive(Debug, Clone, Deserialize)]
pub struct NewSource {
    #[serde(default)]
    pub title: Option<String>,
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourcesRequest {
    #[serde(default)]
    pub add: Vec<NewSource>,
    #[serde(default)]
    pub remove_ids: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PeriodRequest {
    pub period_week: String,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct FetchSummary {
    pub sources: usize,
    pub fetched: usize,
    pub inserted: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Research {
    #[serde(default)]
    pub trends: Vec<String>,
    #[serde(default)]
    pub gaps: Vec<String>,
    #[serde(default)]
    pub angles: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Draft {
    pub period_week: NaiveDate,
    pub subjects: Vec<String>,
    pub draft_md: String,
    pub used_fallback: bool,
}

/// Applies additions then removals and returns the resulting source list.
pub fn update_sources(
    ctx: &AppContext,
    owner: &str,
    request: SourcesRequest,
) -> AppResult<Vec<NewsletterSource>> {
    let mut additions = Vec::with_capacity(request.add.len());
    for source in &request.add {
        let url = Url::parse(source.url.trim())
            .ok()
            .filter(|url| matches!(url.scheme(), "http" | "https"))
            .ok_or_else(|| AppError::validation(format!("invalid feed url: {}", source.url)))?;
        let title = source
            .title
            .as_deref()
            .map(str::trim)
            .filter(|title| !title.is_empty());
        check_length("title", title, MAX_SOURCE_TITLE_CHARS)?;
        additions.push((title, url));
    }
    if let Some(id) = request.remove_ids.iter().find(|id| **id <= 0) {
        return Err(AppError::validation(format!(
            "remove_ids must be positive integers, got {id}"
        )));
    }

    let database = ctx.open_database()?;
    for (title, url) in &additions {
        database.upsert_newsletter_source(owner, *title, url.as_str())?;
    }
    let removed = database.remove_newsletter_sources(owner, &request.remove_ids)?;
    let sources = database.newsletter_sources(owner)?;
    info!(owner, added = additions.len(), removed, total = sources.len(), "newsletter sources updated");

    Ok(sources)
}

/// Pulls every source through the feed backend. Items without a link are
/// skipped; an unreachable feed contributes nothing.
pub async fn fetch(ctx: &AppContext, owner: &str) -> AppResult<FetchSummary> {
    let sources = ctx.open_database()?.newsletter_sources(owner)?;

    let mut posts = Vec::new();
    for source in &sources {
        let items = ctx.feeds.fetch(&source.url).await;
        if items.is_empty() {
            warn!(owner, url = %source.url, "feed produced no items");
        }

        posts.extend(items.into_iter().filter_map(|item| {
            let link = item.link.filter(|link| !link.trim().is_empty())?;
            Some(NewsletterPost {
                source_id: source.id,
                title: item
                    .title
                    .filter(|title| !title.trim().is_empty())
                    .unwrap_or_else(|| UNTITLED.to_string()),
                link,
                summary: item.summary,
                published_at: item.published_at,
            })
        }));
    }

    let fetched = posts.len();
    let inserted = ctx.open_database()?.upsert_newsletter_posts(owner, &posts)?;
    info!(owner, sources = sources.len(), fetched, inserted, "newsletter posts fetched");

    Ok(FetchSummary {
        sources: sources.len(),
        fetched,
        inserted,
    })
}

fn window_start(period_week: NaiveDate) -> DateTime<Utc> {
    (period_week - Duration::days(RESEARCH_WINDOW_DAYS))
        .and_time(NaiveTime::MIN)
        .and_utc()
}

pub async fn research(ctx: &AppContext, owner: &str, request: PeriodRequest) -> AppResult<Research> {
    let period_week = parse_iso_date("period_week", &request.period_week)?;
    let since = window_start(period_week);
    let posts = ctx.open_database()?.newsletter_posts_since(owner, since)?;
    if posts.is_empty() {
        return Err(AppError::validation(format!(
            "no newsletter posts since {}; fetch sources first",
            since.date_naive()
        )));
    }

    let payload = serde_json::to_string(&json!({ "period_week": period_week, "posts": posts }))
        .context("Failed to serialize research payload")?;
    let research = ctx
        .summarizer
        .generate_json::<Research>(prompts::CONTENT_RESEARCHER, &payload)
        .await?;
    info!(owner, period = %period_week, posts = posts.len(), "newsletter research generated");

    Ok(research)
}

pub async fn draft(ctx: &AppContext, owner: &str, request: PeriodRequest) -> AppResult<Draft> {
    let period_week = parse_iso_date("period_week", &request.period_week)?;

    let (posts, samples) = {
        let database = ctx.open_database()?;
        let posts = database.newsletter_posts_since(owner, window_start(period_week))?;
        let samples = database.recent_newsletter_drafts(owner, VOICE_SAMPLES)?;
        (posts, samples)
    };

    let payload = serde_json::to_string(&json!({
        "period_week": period_week,
        "posts": posts,
        "voice_samples": samples,
    }))
    .context("Failed to serialize draft payload")?;
    let generated = ctx
        .summarizer
        .generate_text(prompts::NEWSLETTER_WRITER, &payload)
        .await?;

    let (subjects, draft_md) = parse_draft(&generated.text);
    ctx.open_database()?
        .upsert_newsletter_draft(owner, period_week, &subjects, &draft_md)?;
    info!(owner, period = %period_week, subjects = subjects.len(), "newsletter draft stored");

    Ok(Draft {
        period_week,
        subjects,
        draft_md,
        used_fallback: generated.used_fallback(),
    })
}

/// Splits writer output into subject options and the body. Subjects are the
/// first three `-` bullets ahead of the `DRAFT:` marker; without a marker the
/// whole text is both searched and kept as the body.
pub fn parse_draft(text: &str) -> (Vec<String>, String) {
    let (header, body) = match text.find(DRAFT_MARKER) {
        Some(index) => (&text[..index], &text[index + DRAFT_MARKER.len()..]),
        None => (text, text),
    };

    let subjects = header
        .lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix('-'))
        .map(|subject| subject.trim().to_string())
        .filter(|subject| !subject.is_empty())
        .take(SUBJECT_OPTIONS)
        .collect();

    (subjects, body.trim().to_string())
}
