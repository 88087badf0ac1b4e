use crate::ai::{AiError, prompts};
use crate::context::AppContext;
use crate::db::notes::Braindump;
use crate::error::{AppError, AppResult};
use crate::journal::check_length;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

const MAX_TITLE_CHARS: usize = 120;

#[derive(Debug, Clone, Deserialize)]
pub struct IngestRequest {
    #[serde(default)]
    pub title: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeRequest {
    pub braindump_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Insights {
    #[serde(default)]
    pub themes: Vec<String>,
    #[serde(default)]
    pub questions: Vec<String>,
    #[serde(default)]
    pub connections: Vec<String>,
    #[serde(default)]
    pub breakthroughs: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub braindump_id: i64,
    pub analysis_md: String,
    pub insights: Insights,
    pub used_fallback: bool,
}

pub fn ingest(ctx: &AppContext, owner: &str, request: IngestRequest) -> AppResult<Braindump> {
    let content = request.content.trim();
    if content.is_empty() {
        return Err(AppError::validation("content must not be empty"));
    }
    let title = request
        .title
        .as_deref()
        .map(str::trim)
        .filter(|title| !title.is_empty());
    check_length("title", title, MAX_TITLE_CHARS)?;

    let braindump = ctx.open_database()?.insert_braindump(owner, title, content)?;
    info!(owner, braindump_id = braindump.id, "braindump saved");

    Ok(braindump)
}

/// Insight extraction degrades to empty insights when generation fails; a
/// malformed extraction is still an error.
pub async fn analyze(ctx: &AppContext, owner: &str, request: AnalyzeRequest) -> AppResult<Analysis> {
    if request.braindump_id <= 0 {
        return Err(AppError::validation("braindump_id must be a positive integer"));
    }

    let (braindump, project_type) = {
        let database = ctx.open_database()?;
        let braindump = database
            .braindump(owner, request.braindump_id)?
            .ok_or_else(|| {
                AppError::not_found(format!("no braindump with id {}", request.braindump_id))
            })?;
        let project_type = database
            .profile(owner)?
            .and_then(|profile| profile.project_type);
        (braindump, project_type)
    };

    let insights = match ctx
        .summarizer
        .generate_json::<Insights>(prompts::INSIGHT_EXTRACTOR, &braindump.content)
        .await
    {
        Ok(insights) => insights,
        Err(error @ AiError::Generation { .. }) => {
            warn!(owner, braindump_id = braindump.id, error = %error, "insight extraction unavailable");
            Insights::default()
        }
        Err(error) => return Err(error.into()),
    };

    let payload = serde_json::to_string(&json!({
        "title": braindump.title,
        "content": braindump.content,
        "insights": insights,
        "project_type": project_type,
    }))
    .context("Failed to serialize braindump payload")?;
    let generated = ctx
        .summarizer
        .generate_text(prompts::BRAINDUMP_ANALYST, &payload)
        .await?;

    let stored_insights = serde_json::to_value(&insights).context("Failed to serialize insights")?;
    ctx.open_database()?.upsert_braindump_analysis(
        owner,
        braindump.id,
        &generated.text,
        &stored_insights,
    )?;
    info!(owner, braindump_id = braindump.id, "braindump analysis stored");

    Ok(Analysis {
        braindump_id: braindump.id,
        used_fallback: generated.used_fallback(),
        analysis_md: generated.text,
        insights,
    })
}

#[cfg(test)]
mod tests {
    use super::{AnalyzeRequest, IngestRequest, analyze, ingest};
    use crate::ai::prompts;
    use crate::ai::testing::{FALLBACK, PRIMARY, ScriptedGenerator};
    use crate::context::testing::test_context;
    use crate::db::notes::Profile;
    use crate::error::AppError;
    use std::sync::Arc;

    fn dump(content: &str) -> IngestRequest {
        IngestRequest {
            title: Some("Sunday thoughts".to_string()),
            content: content.to_string(),
        }
    }

    #[test]
    fn blank_content_and_long_titles_are_rejected() {
        let test = test_context(Arc::new(ScriptedGenerator::default()));

        assert!(matches!(
            ingest(&test.context, "U", dump("   ")),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            ingest(
                &test.context,
                "U",
                IngestRequest {
                    title: Some("t".repeat(121)),
                    content: "body".to_string(),
                }
            ),
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn extracted_insights_feed_the_analysis() {
        let generator = Arc::new(
            ScriptedGenerator::default()
                .reply(
                    PRIMARY,
                    Ok("```json\n{\"themes\":[\"focus\"],\"questions\":[\"why?\"]}\n```"),
                )
                .reply(PRIMARY, Ok("## Mind map")),
        );
        let test = test_context(generator.clone());
        let ctx = &test.context;
        ctx.open_database()
            .expect("database")
            .upsert_profile(
                "U",
                &Profile {
                    project_type: Some("creator".to_string()),
                    ..Profile::default()
                },
            )
            .expect("profile");
        let saved = ingest(ctx, "U", dump("I keep coming back to focus.")).expect("ingest");

        let analysis = analyze(
            ctx,
            "U",
            AnalyzeRequest {
                braindump_id: saved.id,
            },
        )
        .await
        .expect("analysis");

        assert_eq!(analysis.insights.themes, vec!["focus"]);
        assert!(analysis.insights.breakthroughs.is_empty());
        assert_eq!(analysis.analysis_md, "## Mind map");

        let calls = generator.calls();
        assert_eq!(calls[0].system, prompts::INSIGHT_EXTRACTOR);
        assert_eq!(calls[0].temperature, 0.1);
        assert_eq!(calls[1].system, prompts::BRAINDUMP_ANALYST);
        assert!(calls[1].user.contains("\"project_type\":\"creator\""));
    }

    #[tokio::test]
    async fn unavailable_extraction_degrades_to_empty_insights() {
        let generator = Arc::new(
            ScriptedGenerator::default()
                .reply(PRIMARY, Err("timeout"))
                .reply(FALLBACK, Err("timeout"))
                .reply(PRIMARY, Ok("## Mind map")),
        );
        let test = test_context(generator);
        let saved = ingest(&test.context, "U", dump("loose ideas")).expect("ingest");

        let analysis = analyze(
            &test.context,
            "U",
            AnalyzeRequest {
                braindump_id: saved.id,
            },
        )
        .await
        .expect("analysis");

        assert!(analysis.insights.themes.is_empty());
        assert_eq!(analysis.analysis_md, "## Mind map");
    }

    #[tokio::test]
    async fn malformed_extraction_is_surfaced() {
        let generator = Arc::new(ScriptedGenerator::default().reply(PRIMARY, Ok("no json here")));
        let test = test_context(generator.clone());
        let saved = ingest(&test.context, "U", dump("loose ideas")).expect("ingest");

        let error = analyze(
            &test.context,
            "U",
            AnalyzeRequest {
                braindump_id: saved.id,
            },
        )
        .await
        .expect_err("parse failure");

        assert!(matches!(error, AppError::Parse(_)));
        assert_eq!(generator.calls().len(), 1);
    }

    #[tokio::test]
    async fn ids_must_be_positive_and_owned() {
        let test = test_context(Arc::new(ScriptedGenerator::default()));
        let saved = ingest(&test.context, "U", dump("mine")).expect("ingest");

        let negative = analyze(&test.context, "U", AnalyzeRequest { braindump_id: 0 }).await;
        assert!(matches!(negative, Err(AppError::Validation(_))));

        let foreign = analyze(
            &test.context,
            "someone-else",
            AnalyzeRequest {
                braindump_id: saved.id,
            },
        )
        .await;
        assert!(matches!(foreign, Err(AppError::NotFound(_))));
    }
}
