use super::Database;
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JournalInput {
    pub entry_date: String,
    #[serde(default)]
    pub mood: Option<u8>,
    #[serde(default)]
    pub mood_desc: Option<String>,
    #[serde(default)]
    pub energy: Option<u8>,
    #[serde(default)]
    pub accomplishments: Vec<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub blockers: Option<String>,
    #[serde(default)]
    pub gratitude: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JournalEntry {
    pub id: i64,
    pub entry_date: NaiveDate,
    pub mood: Option<u8>,
    pub mood_desc: Option<String>,
    pub energy: Option<u8>,
    pub accomplishments: Vec<String>,
    pub priority: Option<String>,
    pub blockers: Option<String>,
    pub gratitude: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Braindump {
    pub id: i64,
    pub title: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub project_type: Option<String>,
    #[serde(default)]
    pub interests: Vec<String>,
}

const JOURNAL_COLUMNS: &str = "id, entry_date, mood, mood_desc, energy, accomplishments, priority, blockers, gratitude, notes";

impl Database {
    pub fn upsert_journal_entry(
        &self,
        owner: &str,
        entry_date: NaiveDate,
        input: &JournalInput,
    ) -> Result<JournalEntry> {
        let accomplishments = serde_json::to_string(&input.accomplishments)
            .context("Failed to serialize accomplishments")?;

        self.conn
            .execute(
                "INSERT INTO journal_entries
                 (owner, entry_date, mood, mood_desc, energy, accomplishments, priority, blockers, gratitude, notes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(owner, entry_date)
                 DO UPDATE SET mood=excluded.mood, mood_desc=excluded.mood_desc, energy=excluded.energy,
                   accomplishments=excluded.accomplishments, priority=excluded.priority,
                   blockers=excluded.blockers, gratitude=excluded.gratitude, notes=excluded.notes",
                params![
                    owner,
                    entry_date,
                    input.mood,
                    &input.mood_desc,
                    input.energy,
                    accomplishments,
                    &input.priority,
                    &input.blockers,
                    &input.gratitude,
                    &input.notes,
                ],
            )
            .context("Failed to upsert journal entry")?;

        self.journal_entry(owner, entry_date)?
            .context("Journal entry missing after upsert")
    }

    pub fn journal_entry(&self, owner: &str, entry_date: NaiveDate) -> Result<Option<JournalEntry>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {JOURNAL_COLUMNS} FROM journal_entries WHERE owner = ?1 AND entry_date = ?2"
                ),
                params![owner, entry_date],
                journal_from_row,
            )
            .optional()
            .context("Failed to query journal entry")
    }

    /// Most recent entries strictly before `entry_date`, newest first.
    pub fn journal_entries_before(
        &self,
        owner: &str,
        entry_date: NaiveDate,
        limit: usize,
    ) -> Result<Vec<JournalEntry>> {
        let mut statement = self.conn.prepare(&format!(
            "SELECT {JOURNAL_COLUMNS} FROM journal_entries
             WHERE owner = ?1 AND entry_date < ?2
             ORDER BY entry_date DESC
             LIMIT ?3"
        ))?;

        let rows = statement
            .query_map(params![owner, entry_date, limit as i64], journal_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query previous journal entries")?;

        Ok(rows)
    }

    pub fn upsert_journal_reflection(&self, owner: &str, entry_id: i64, reflection_md: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO journal_reflections (owner, entry_id, reflection_md, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(owner, entry_id)
                 DO UPDATE SET reflection_md=excluded.reflection_md, created_at=excluded.created_at",
                params![owner, entry_id, reflection_md, Utc::now()],
            )
            .context("Failed to upsert journal reflection")?;

        Ok(())
    }

    pub fn journal_reflection(&self, owner: &str, entry_id: i64) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT reflection_md FROM journal_reflections WHERE owner = ?1 AND entry_id = ?2",
                params![owner, entry_id],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query journal reflection")
    }

    pub fn insert_braindump(&self, owner: &str, title: Option<&str>, content: &str) -> Result<Braindump> {
        let created_at = Utc::now();
        self.conn
            .execute(
                "INSERT INTO braindumps (owner, title, content, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![owner, title, content, created_at],
            )
            .context("Failed to insert braindump")?;

        Ok(Braindump {
            id: self.conn.last_insert_rowid(),
            title: title.map(str::to_string),
            content: content.to_string(),
            created_at,
        })
    }

    pub fn braindump(&self, owner: &str, id: i64) -> Result<Option<Braindump>> {
        self.conn
            .query_row(
                "SELECT id, title, content, created_at FROM braindumps WHERE owner = ?1 AND id = ?2",
                params![owner, id],
                |row| {
                    Ok(Braindump {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        content: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                },
            )
            .optional()
            .context("Failed to query braindump")
    }

    pub fn upsert_braindump_analysis(
        &self,
        owner: &str,
        braindump_id: i64,
        analysis_md: &str,
        insights: &Value,
    ) -> Result<()> {
        let insights = serde_json::to_string(insights).context("Failed to serialize insights")?;

        self.conn
            .execute(
                "INSERT INTO braindump_analyses (owner, braindump_id, analysis_md, insights, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(owner, braindump_id)
                 DO UPDATE SET analysis_md=excluded.analysis_md, insights=excluded.insights, created_at=excluded.created_at",
                params![owner, braindump_id, analysis_md, insights, Utc::now()],
            )
            .context("Failed to upsert braindump analysis")?;

        Ok(())
    }

    pub fn profile(&self, owner: &str) -> Result<Option<Profile>> {
        self.conn
            .query_row(
                "SELECT full_name, project_type, interests FROM profiles WHERE owner = ?1",
                params![owner],
                |row| {
                    let interests: String = row.get(2)?;
                    Ok(Profile {
                        full_name: row.get(0)?,
                        project_type: row.get(1)?,
                        interests: serde_json::from_str(&interests).unwrap_or_default(),
                    })
                },
            )
            .optional()
            .context("Failed to query profile")
    }

    pub fn upsert_profile(&self, owner: &str, profile: &Profile) -> Result<()> {
        let interests =
            serde_json::to_string(&profile.interests).context("Failed to serialize interests")?;

        self.conn
            .execute(
                "INSERT INTO profiles (owner, full_name, project_type, interests, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(owner)
                 DO UPDATE SET full_name=excluded.full_name, project_type=excluded.project_type,
                   interests=excluded.interests, updated_at=excluded.updated_at",
                params![
                    owner,
                    &profile.full_name,
                    &profile.project_type,
                    interests,
                    Utc::now()
                ],
            )
            .context("Failed to upsert profile")?;

        Ok(())
    }
}

fn journal_from_row(row: &Row<'_>) -> rusqlite::Result<JournalEntry> {
    let accomplishments: String = row.get(5)?;

    Ok(JournalEntry {
        id: row.get(0)?,
        entry_date: row.get(1)?,
        mood: row.get(2)?,
        mood_desc: row.get(3)?,
        energy: row.get(4)?,
        accomplishments: serde_json::from_str(&accomplishments).unwrap_or_default(),
        priority: row.get(6)?,
        blockers: row.get(7)?,
        gratitude: row.get(8)?,
        notes: row.get(9)?,
    })
}
