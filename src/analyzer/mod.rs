pub mod aggregate;
pub mod categorizer;
pub mod period;

use crate::ai::prompts;
use crate::analyzer::aggregate::{DaypartCounts, RankedResource, WeekOverWeek};
use crate::analyzer::categorizer::Category;
use crate::analyzer::period::Period;
use crate::context::AppContext;
use crate::db::{ActivityReview, HistoryRecord, HistorySource, ReviewSource};
use crate::error::{AppError, AppResult};
use anyhow::Context;
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use tracing::info;

/// Estimated watch time per video.
pub const MINUTES_PER_VIDEO: usize = 8;
const UNKNOWN_CHANNEL: &str = "Unknown";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserWeek {
    pub period_week: NaiveDate,
    pub total_visits: usize,
    pub total_domains: usize,
    pub reported_visits: u64,
    pub focus_ratio: u32,
    pub categories: BTreeMap<Category, usize>,
    pub dayparts: DaypartCounts,
    pub top_domains: Vec<RankedResource>,
    pub week_over_week: WeekOverWeek,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoWeek {
    pub period_week: NaiveDate,
    pub total_videos: usize,
    pub estimated_minutes: usize,
    pub total_channels: usize,
    pub focus_ratio: u32,
    pub categories: BTreeMap<Category, usize>,
    pub dayparts: DaypartCounts,
    pub top_channels: Vec<RankedResource>,
    pub week_over_week: WeekOverWeek,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewOutcome {
    #[serde(flatten)]
    pub review: ActivityReview,
    pub used_fallback: bool,
}

pub fn browser_week(
    period: Period,
    current: &[HistoryRecord],
    previous: &[HistoryRecord],
) -> BrowserWeek {
    let now = aggregate::aggregate(current, domain_of);
    let before = aggregate::aggregate(previous, domain_of);

    BrowserWeek {
        period_week: period.week_ending(),
        total_visits: now.total,
        total_domains: now.unique_resources,
        reported_visits: now.reported_visits,
        focus_ratio: now.focus_ratio,
        week_over_week: aggregate::compare(&now, &before),
        categories: now.categories,
        dayparts: now.dayparts,
        top_domains: now.top_resources,
    }
}

pub fn video_week(
    period: Period,
    current: &[HistoryRecord],
    previous: &[HistoryRecord],
) -> VideoWeek {
    let now = aggregate::aggregate(current, channel_of);
    let before = aggregate::aggregate(previous, channel_of);

    VideoWeek {
        period_week: period.week_ending(),
        total_videos: now.total,
        estimated_minutes: now.total * MINUTES_PER_VIDEO,
        total_channels: now.unique_resources,
        focus_ratio: now.focus_ratio,
        week_over_week: aggregate::compare(&now, &before),
        categories: now.categories,
        dayparts: now.dayparts,
        top_channels: now.top_resources,
    }
}

fn domain_of(record: &HistoryRecord) -> String {
    record.domain.clone()
}

fn channel_of(record: &HistoryRecord) -> String {
    record
        .channel
        .clone()
        .filter(|channel| !channel.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_CHANNEL.to_string())
}

/// Aggregates, summarizes and stores one weekly review. Regenerating a week
/// replaces the earlier review.
pub async fn review_week(
    ctx: &AppContext,
    owner: &str,
    source: ReviewSource,
    period: Period,
) -> AppResult<ReviewOutcome> {
    let snapshot = match source {
        ReviewSource::Browser => history_snapshot(ctx, owner, HistorySource::Browser, period)?,
        ReviewSource::Video => history_snapshot(ctx, owner, HistorySource::Video, period)?,
        ReviewSource::Combined => combined_snapshot(ctx, owner, period)?,
    };

    let payload = serde_json::to_string(&snapshot).context("Failed to serialize review payload")?;
    let generated = ctx
        .summarizer
        .generate_text(review_template(source), &payload)
        .await?;

    let review = ActivityReview {
        owner: owner.to_string(),
        period_week: period.week_ending(),
        source,
        summary_md: generated.text.clone(),
        snapshot,
        created_at: Utc::now(),
    };
    ctx.open_database()?.upsert_activity_review(&review)?;

    info!(
        owner,
        period = %period.key(),
        source = %source,
        fallback = generated.used_fallback(),
        "weekly review stored"
    );

    Ok(ReviewOutcome {
        review,
        used_fallback: generated.used_fallback(),
    })
}

/// Stored reviews for a week keyed by source name.
pub fn list_reviews(
    ctx: &AppContext,
    owner: &str,
    period: Period,
) -> AppResult<BTreeMap<String, ActivityReview>> {
    let reviews = ctx
        .open_database()?
        .activity_reviews_for_week(owner, period.week_ending())?
        .into_iter()
        .map(|review| (review.source.to_string(), review))
        .collect();

    Ok(reviews)
}

fn review_template(source: ReviewSource) -> &'static str {
    match source {
        ReviewSource::Browser => prompts::BROWSER_WEEK,
        ReviewSource::Video => prompts::VIDEO_WEEK,
        ReviewSource::Combined => prompts::COMBINED_WEEK,
    }
}

fn history_snapshot(
    ctx: &AppContext,
    owner: &str,
    source: HistorySource,
    period: Period,
) -> AppResult<Value> {
    let database = ctx.open_database()?;
    let (start, end) = period.bounds();
    let current = database.history_between(owner, source, start, end)?;
    let (start, end) = period.previous().bounds();
    let previous = database.history_between(owner, source, start, end)?;

    let snapshot = match source {
        HistorySource::Browser => serde_json::to_value(browser_week(period, &current, &previous)),
        HistorySource::Video => serde_json::to_value(video_week(period, &current, &previous)),
    }
    .context("Failed to serialize review snapshot")?;

    Ok(snapshot)
}

fn combined_snapshot(ctx: &AppContext, owner: &str, period: Period) -> AppResult<Value> {
    let database = ctx.open_database()?;
    let week = period.week_ending();
    let browser = database
        .activity_review(owner, week, ReviewSource::Browser)?
        .map(|review| review.snapshot);
    let video = database
        .activity_review(owner, week, ReviewSource::Video)?
        .map(|review| review.snapshot);

    if browser.is_none() && video.is_none() {
        return Err(AppError::validation(format!(
            "no browser or video review exists for the week ending {week}; generate one first"
        )));
    }

    Ok(json!({
        "periodWeek": period.key(),
        "browser": browser,
        "video": video,
    }))
}

#[cfg(test)]
mod tests {
    use super::{list_reviews, review_week, video_week};
    use crate::ai::prompts;
    use crate::ai::testing::{FALLBACK, PRIMARY, ScriptedGenerator};
    use crate::analyzer::categorizer::Category;
    use crate::analyzer::period::Period;
    use crate::collector::export::UploadHint;
    use crate::collector::{IngestRequest, ingest_export};
    use crate::context::testing::test_context;
    use crate::db::{HistoryRecord, HistorySource, ReviewSource};
    use crate::error::AppError;
    use chrono::{DateTime, Duration, Local, Utc};
    use serde_json::json;
    use std::sync::Arc;

    fn video(channel: Option<&str>, occurred_at: DateTime<Utc>) -> HistoryRecord {
        HistoryRecord {
            owner: "U".to_string(),
            source: HistorySource::Video,
            url: "https://www.youtube.com/watch?v=1".to_string(),
            title: Some("clip".to_string()),
            occurred_at,
            occurrences: 1,
            domain: "youtube.com".to_string(),
            channel: channel.map(str::to_string),
            channel_url: None,
            category: Category::Entertainment,
        }
    }

    #[test]
    fn video_week_estimates_minutes_and_names_unknown_channels() {
        let now = Utc::now();
        let period = Period::containing(now.with_timezone(&Local).date_naive());
        let current = vec![
            video(Some("Fireship"), now),
            video(None, now),
            video(Some("Fireship"), now),
        ];

        let week = video_week(period, &current, &[video(None, now)]);

        assert_eq!(week.total_videos, 3);
        assert_eq!(week.estimated_minutes, 24);
        assert_eq!(week.total_channels, 2);
        assert_eq!(week.top_channels[0].name, "Fireship");
        assert_eq!(week.top_channels[1].name, "Unknown");
        assert_eq!(week.week_over_week.total.previous, 1);
    }

    #[tokio::test]
    async fn duplicate_visits_review_as_a_single_focused_visit() {
        let generator = Arc::new(
            ScriptedGenerator::default().reply(PRIMARY, Ok("## Browser Week in Review\n- 1 visit")),
        );
        let test = test_context(generator.clone());
        let ctx = &test.context;

        let base = ((Utc::now() - Duration::days(2)).timestamp() / 60 * 60 + 5) * 1000;
        let body = json!([
            {"url": "https://github.com/org/repo", "visitTime": base},
            {"url": "https://github.com/org/repo", "visitTime": base + 10_000},
        ])
        .to_string();

        let mut database = ctx.open_database().expect("database");
        let summary = ingest_export(
            &mut database,
            &ctx.category_rules().expect("rules"),
            ctx.config.retention_days,
            IngestRequest {
                owner: "U",
                source: HistorySource::Browser,
                hint: UploadHint {
                    filename: Some("history.json"),
                    content_type: None,
                },
                body: body.as_bytes(),
            },
            Utc::now(),
        )
        .expect("ingest");
        drop(database);
        assert_eq!(summary.inserted, 1);
        assert_eq!(summary.duplicates, 1);

        let visited = DateTime::<Utc>::from_timestamp_millis(base).expect("timestamp");
        let period = Period::containing(visited.with_timezone(&Local).date_naive());
        let outcome = review_week(ctx, "U", ReviewSource::Browser, period)
            .await
            .expect("review");

        let snapshot = &outcome.review.snapshot;
        assert_eq!(snapshot["totalVisits"], 1);
        assert_eq!(snapshot["focusRatio"], 100);
        assert_eq!(snapshot["categories"], json!({"work": 1}));
        assert_eq!(snapshot["topDomains"][0]["name"], "github.com");
        assert!(!outcome.used_fallback);

        let calls = generator.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].system, prompts::BROWSER_WEEK);
        assert_eq!(calls[0].temperature, 0.2);

        let stored = list_reviews(ctx, "U", period).expect("list");
        assert_eq!(
            stored["browser"].summary_md,
            "## Browser Week in Review\n- 1 visit"
        );
        assert!(list_reviews(ctx, "someone-else", period).expect("list").is_empty());
    }

    #[tokio::test]
    async fn combined_review_needs_a_stored_source_review() {
        let generator = Arc::new(ScriptedGenerator::default());
        let test = test_context(generator.clone());

        let error = review_week(&test.context, "U", ReviewSource::Combined, Period::current())
            .await
            .expect_err("nothing to combine");

        assert!(matches!(error, AppError::Validation(_)));
        assert!(generator.calls().is_empty());
    }

    #[tokio::test]
    async fn combined_review_reads_stored_snapshots() {
        let generator = Arc::new(
            ScriptedGenerator::default()
                .reply(PRIMARY, Ok("video summary"))
                .reply(PRIMARY, Err("rate limited"))
                .reply(FALLBACK, Ok("combined summary")),
        );
        let test = test_context(generator.clone());
        let period = Period::current();

        review_week(&test.context, "U", ReviewSource::Video, period)
            .await
            .expect("video review");
        let combined = review_week(&test.context, "U", ReviewSource::Combined, period)
            .await
            .expect("combined review");

        assert!(combined.used_fallback);
        assert_eq!(combined.review.snapshot["video"]["totalVideos"], 0);
        assert!(combined.review.snapshot["browser"].is_null());

        let calls = generator.calls();
        assert_eq!(calls.last().expect("call").system, prompts::COMBINED_WEEK);

        let stored = list_reviews(&test.context, "U", period).expect("list");
        assert_eq!(stored.len(), 2);
        assert_eq!(stored["combined"].summary_md, "combined summary");
    }

    #[tokio::test]
    async fn failed_generation_stores_nothing() {
        let generator = Arc::new(
            ScriptedGenerator::default()
                .reply(PRIMARY, Err("down"))
                .reply(FALLBACK, Err("also down")),
        );
        let test = test_context(generator);
        let period = Period::current();

        let error = review_week(&test.context, "U", ReviewSource::Browser, period)
            .await
            .expect_err("both routes fail");

        assert!(matches!(error, AppError::Generation(_)));
        assert!(list_reviews(&test.context, "U", period).expect("list").is_empty());
    }
}
