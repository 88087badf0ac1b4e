use crate::ai::{AiError, prompts};
use crate::analyzer::period::parse_iso_date;
use crate::context::AppContext;
use crate::error::AppResult;
use crate::fetch::SearchResult;
use anyhow::Context;
use chrono::{Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use tracing::{info, warn};

const MAX_SEARCH_TAGS: usize = 5;
const RECENCY_DAYS: u32 = 7;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BriefRequest {
    #[serde(default)]
    pub brief_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BriefItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub why_it_matters: String,
    #[serde(default)]
    pub action: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Brief {
    pub brief_date: NaiveDate,
    pub items: Vec<BriefItem>,
    pub stored: bool,
}

impl Brief {
    fn empty(brief_date: NaiveDate) -> Self {
        Self {
            brief_date,
            items: Vec::new(),
            stored: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct InterestTags {
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Serialize)]
struct TaggedResult<'a> {
    tag: &'a str,
    #[serde(flatten)]
    result: &'a SearchResult,
}

/// Interest tags, a web search per tag, then curation. An empty brief is
/// returned unsaved when there is nothing to curate.
pub async fn run(ctx: &AppContext, owner: &str, request: BriefRequest) -> AppResult<Brief> {
    let brief_date = match request.brief_date.as_deref() {
        Some(raw) => parse_iso_date("brief_date", raw)?,
        None => Local::now().date_naive(),
    };

    let (profile, metric_labels) = {
        let database = ctx.open_database()?;
        let profile = database.profile(owner)?.unwrap_or_default();
        let labels = database.metric_labels(owner)?;
        (profile, labels)
    };

    let payload = serde_json::to_string(&json!({
        "interests": profile.interests,
        "metric_labels": metric_labels,
        "project_type": profile.project_type,
    }))
    .context("Failed to serialize interest payload")?;
    let tags = match ctx
        .summarizer
        .generate_json::<InterestTags>(prompts::INTEREST_ANALYZER, &payload)
        .await
    {
        Ok(found) => search_tags(found.tags),
        Err(error @ AiError::Generation { .. }) => {
            warn!(owner, error = %error, "interest tags unavailable, returning an empty brief");
            return Ok(Brief::empty(brief_date));
        }
        Err(error) => return Err(error.into()),
    };

    let mut results: Vec<(String, SearchResult)> = Vec::new();
    let mut seen_urls = HashSet::new();
    for tag in &tags {
        match ctx.search.search(tag, RECENCY_DAYS).await {
            Ok(found) => results.extend(
                found
                    .into_iter()
                    .filter(|result| seen_urls.insert(result.url.clone()))
                    .map(|result| (tag.clone(), result)),
            ),
            Err(error) => warn!(owner, tag = %tag, error = %error, "search failed for tag"),
        }
    }

    if results.is_empty() {
        info!(owner, tags = tags.len(), "no search results for brief");
        return Ok(Brief::empty(brief_date));
    }

    let tagged = results
        .iter()
        .map(|(tag, result)| TaggedResult { tag, result })
        .collect::<Vec<_>>();
    let payload = serde_json::to_string(&json!({
        "brief_date": brief_date,
        "tags": tags,
        "results": tagged,
    }))
    .context("Failed to serialize curation payload")?;
    let curated = ctx
        .summarizer
        .generate_json::<Vec<BriefItem>>(prompts::NEWS_CURATOR, &payload)
        .await?;

    let items = fresh_items(curated, brief_date);
    let stored_items = serde_json::to_value(&items).context("Failed to serialize brief items")?;
    ctx.open_database()?
        .upsert_daily_brief(owner, brief_date, &stored_items)?;
    info!(owner, brief_date = %brief_date, items = items.len(), "daily brief stored");

    Ok(Brief {
        brief_date,
        items,
        stored: true,
    })
}

fn search_tags(tags: Vec<String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.trim().to_string();
        if !tag.is_empty() && !unique.contains(&tag) {
            unique.push(tag);
        }
    }
    unique.truncate(MAX_SEARCH_TAGS);
    unique
}

/// Drops items without a url and items dated more than a week before the
/// brief. Undated items are kept.
fn fresh_items(items: Vec<BriefItem>, brief_date: NaiveDate) -> Vec<BriefItem> {
    let oldest = brief_date - Duration::days(i64::from(RECENCY_DAYS));

    items
        .into_iter()
        .filter(|item| !item.url.trim().is_empty())
        .filter(|item| {
            item.published_at
                .as_deref()
                .and_then(|raw| raw.get(..10))
                .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok())
                .is_none_or(|day| day >= oldest)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{BriefItem, BriefRequest, fresh_items, run};
    use crate::ai::prompts;
    use crate::ai::testing::{FALLBACK, PRIMARY, ScriptedGenerator};
    use crate::context::testing::{test_context, with_backends};
    use crate::db::notes::Profile;
    use crate::error::AppError;
    use crate::fetch::SearchResult;
    use crate::fetch::testing::{StaticFeeds, StaticSearch};
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn item(url: &str, published_at: Option<&str>) -> BriefItem {
        BriefItem {
            title: "t".to_string(),
            url: url.to_string(),
            published_at: published_at.map(str::to_string),
            why_it_matters: String::new(),
            action: String::new(),
        }
    }

    fn request() -> BriefRequest {
        BriefRequest {
            brief_date: Some("2024-06-10".to_string()),
        }
    }

    #[test]
    fn stale_and_linkless_items_are_dropped() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 10).expect("date");
        let kept = fresh_items(
            vec![
                item("https://a.example", Some("2024-06-09")),
                item("https://b.example", Some("2024-05-01")),
                item("", Some("2024-06-09")),
                item("https://c.example", None),
                item("https://d.example", Some("2024-06-03T08:00:00Z")),
            ],
            date,
        );

        let urls = kept.iter().map(|item| item.url.as_str()).collect::<Vec<_>>();
        assert_eq!(urls, vec!["https://a.example", "https://c.example", "https://d.example"]);
    }

    #[tokio::test]
    async fn tags_search_and_curation_produce_a_stored_brief() {
        let search = StaticSearch {
            results: HashMap::from([(
                "rust".to_string(),
                vec![SearchResult {
                    title: "Rust 2024".to_string(),
                    url: "https://blog.rust-lang.org/2024".to_string(),
                    snippet: "edition".to_string(),
                    published_date: Some("2024-06-08".to_string()),
                }],
            )]),
            ..StaticSearch::default()
        };
        let generator = Arc::new(
            ScriptedGenerator::default()
                .reply(PRIMARY, Ok(r#"{"tags":["rust","sqlite","rust"]}"#))
                .reply(
                    PRIMARY,
                    Ok(r#"[{"title":"Rust 2024","url":"https://blog.rust-lang.org/2024","published_at":"2024-06-08","why_it_matters":"you write Rust","action":"read it"}]"#),
                ),
        );
        let test = with_backends(generator.clone(), search, StaticFeeds::default());
        let ctx = &test.context;
        ctx.open_database()
            .expect("database")
            .upsert_profile(
                "U",
                &Profile {
                    interests: vec!["rust".to_string()],
                    ..Profile::default()
                },
            )
            .expect("profile");

        let brief = run(ctx, "U", request()).await.expect("brief");

        assert!(brief.stored);
        assert_eq!(brief.items.len(), 1);
        assert_eq!(brief.items[0].action, "read it");

        let calls = generator.calls();
        assert_eq!(calls[0].system, prompts::INTEREST_ANALYZER);
        assert!(calls[0].user.contains("\"interests\":[\"rust\"]"));
        assert_eq!(calls[1].system, prompts::NEWS_CURATOR);
        assert!(calls[1].user.contains("\"tag\":\"rust\""));

        let stored = ctx
            .open_database()
            .expect("database")
            .daily_brief("U", brief.brief_date)
            .expect("query")
            .expect("stored brief");
        assert_eq!(stored[0]["url"], "https://blog.rust-lang.org/2024");
    }

    #[tokio::test]
    async fn failing_searches_leave_an_unsaved_empty_brief() {
        let generator =
            Arc::new(ScriptedGenerator::default().reply(PRIMARY, Ok(r#"{"tags":["quantum"]}"#)));
        let test = test_context(generator.clone());

        let brief = run(&test.context, "U", request()).await.expect("brief");

        assert!(brief.items.is_empty());
        assert!(!brief.stored);
        assert_eq!(generator.calls().len(), 1);
        let stored = test
            .context
            .open_database()
            .expect("database")
            .daily_brief("U", brief.brief_date)
            .expect("query");
        assert!(stored.is_none());
    }

    #[tokio::test]
    async fn unavailable_tags_give_an_empty_brief() {
        let generator = Arc::new(
            ScriptedGenerator::default()
                .reply(PRIMARY, Err("down"))
                .reply(FALLBACK, Err("down")),
        );
        let test = test_context(generator);

        let brief = run(&test.context, "U", request()).await.expect("brief");
        assert!(brief.items.is_empty());
        assert!(!brief.stored);
    }

    #[tokio::test]
    async fn malformed_tags_are_surfaced() {
        let generator = Arc::new(ScriptedGenerator::default().reply(PRIMARY, Ok("tags: rust")));
        let test = test_context(generator);

        let error = run(&test.context, "U", request()).await.expect_err("parse");
        assert!(matches!(error, AppError::Parse(_)));
    }
}
