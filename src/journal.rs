use crate::ai::prompts;
use crate::analyzer::period::parse_iso_date;
use crate::context::AppContext;
use crate::db::notes::{JournalEntry, JournalInput};
use crate::error::{AppError, AppResult};
use anyhow::Context;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

const MAX_SHORT_TEXT_CHARS: usize = 280;
const MAX_ACCOMPLISHMENTS: usize = 5;
const MAX_ACCOMPLISHMENT_CHARS: usize = 200;
const MAX_NOTES_CHARS: usize = 2000;
const HISTORY_ENTRIES: usize = 3;

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeRequest {
    pub entry_date: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Reflection {
    pub entry_id: i64,
    pub entry_date: NaiveDate,
    pub reflection_md: String,
    pub used_fallback: bool,
}

pub fn create_entry(ctx: &AppContext, owner: &str, input: JournalInput) -> AppResult<JournalEntry> {
    let entry_date = validate_entry(&input)?;
    let entry = ctx
        .open_database()?
        .upsert_journal_entry(owner, entry_date, &input)?;
    info!(owner, entry_date = %entry_date, "journal entry saved");

    Ok(entry)
}

fn validate_entry(input: &JournalInput) -> AppResult<NaiveDate> {
    let entry_date = parse_iso_date("entry_date", &input.entry_date)?;

    for (field, score) in [("mood", input.mood), ("energy", input.energy)] {
        if score.is_some_and(|score| !(1..=10).contains(&score)) {
            return Err(AppError::validation(format!("{field} must be between 1 and 10")));
        }
    }

    for (field, text) in [
        ("mood_desc", &input.mood_desc),
        ("priority", &input.priority),
        ("blockers", &input.blockers),
        ("gratitude", &input.gratitude),
    ] {
        check_length(field, text.as_deref(), MAX_SHORT_TEXT_CHARS)?;
    }
    check_length("notes", input.notes.as_deref(), MAX_NOTES_CHARS)?;

    if input.accomplishments.len() > MAX_ACCOMPLISHMENTS {
        return Err(AppError::validation(format!(
            "at most {MAX_ACCOMPLISHMENTS} accomplishments are allowed"
        )));
    }
    for item in &input.accomplishments {
        check_length("accomplishment", Some(item.as_str()), MAX_ACCOMPLISHMENT_CHARS)?;
    }

    Ok(entry_date)
}

pub(crate) fn check_length(field: &str, text: Option<&str>, max: usize) -> AppResult<()> {
    match text {
        Some(text) if text.chars().count() > max => Err(AppError::validation(format!(
            "{field} must be at most {max} characters"
        ))),
        _ => Ok(()),
    }
}

/// Reflects on one entry with up to three earlier entries as context.
pub async fn analyze_entry(
    ctx: &AppContext,
    owner: &str,
    request: AnalyzeRequest,
) -> AppResult<Reflection> {
    let entry_date = parse_iso_date("entry_date", &request.entry_date)?;

    let (today, history) = {
        let database = ctx.open_database()?;
        let today = database
            .journal_entry(owner, entry_date)?
            .ok_or_else(|| AppError::not_found(format!("no journal entry for {entry_date}")))?;
        let history = database.journal_entries_before(owner, entry_date, HISTORY_ENTRIES)?;
        (today, history)
    };

    let payload = serde_json::to_string(&json!({ "today": today, "history": history }))
        .context("Failed to serialize journal payload")?;
    let generated = ctx
        .summarizer
        .generate_text(prompts::DAILY_REFLECTION, &payload)
        .await?;

    ctx.open_database()?
        .upsert_journal_reflection(owner, today.id, &generated.text)?;
    info!(owner, entry_date = %entry_date, "journal reflection stored");

    Ok(Reflection {
        entry_id: today.id,
        entry_date,
        used_fallback: generated.used_fallback(),
        reflection_md: generated.text,
    })
}
