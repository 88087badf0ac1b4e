use crate::context::AppContext;
use crate::db::notes::Profile;
use crate::error::{AppError, AppResult};
use crate::journal::check_length;
use crate::metrics::ProjectType;
use tracing::info;

const MAX_NAME_CHARS: usize = 120;
const MAX_INTERESTS: usize = 20;
const MAX_INTEREST_CHARS: usize = 60;

/// Stored profile, or an empty one for owners who never saved theirs.
pub fn load(ctx: &AppContext, owner: &str) -> AppResult<Profile> {
    Ok(ctx.open_database()?.profile(owner)?.unwrap_or_default())
}

pub fn save(ctx: &AppContext, owner: &str, profile: Profile) -> AppResult<Profile> {
    let profile = normalize(profile)?;
    ctx.open_database()?.upsert_profile(owner, &profile)?;
    info!(owner, interests = profile.interests.len(), "profile saved");

    Ok(profile)
}

fn normalize(profile: Profile) -> AppResult<Profile> {
    let full_name = profile
        .full_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty());
    check_length("full_name", full_name.as_deref(), MAX_NAME_CHARS)?;

    let project_type = profile
        .project_type
        .as_deref()
        .filter(|raw| !raw.trim().is_empty())
        .map(|raw| {
            ProjectType::parse(raw)
                .map(|parsed| parsed.as_str().to_string())
                .ok_or_else(|| AppError::validation(format!("unknown project_type: {raw}")))
        })
        .transpose()?;

    let mut interests: Vec<String> = Vec::new();
    for interest in profile.interests {
        let interest = interest.trim().to_string();
        check_length("interest", Some(interest.as_str()), MAX_INTEREST_CHARS)?;
        if !interest.is_empty() && !interests.contains(&interest) {
            interests.push(interest);
        }
    }
    if interests.len() > MAX_INTERESTS {
        return Err(AppError::validation(format!(
            "at most {MAX_INTERESTS} interests are allowed"
        )));
    }

    Ok(Profile {
        full_name,
        project_type,
        interests,
    })
}

#[cfg(test)]
mod tests {
    use super::{load, save};
    use crate::ai::testing::ScriptedGenerator;
    use crate::context::testing::test_context;
    use crate::db::notes::Profile;
    use crate::error::AppError;
    use std::sync::Arc;

    #[test]
    fn missing_profile_is_empty() {
        let test = test_context(Arc::new(ScriptedGenerator::default()));
        let profile = load(&test.context, "U").expect("profile");

        assert!(profile.full_name.is_none());
        assert!(profile.interests.is_empty());
    }

    #[test]
    fn saved_profile_is_normalized() {
        let test = test_context(Arc::new(ScriptedGenerator::default()));
        let saved = save(
            &test.context,
            "U",
            Profile {
                full_name: Some("  Sam  ".to_string()),
                project_type: Some("SaaS".to_string()),
                interests: vec![
                    " rust ".to_string(),
                    "rust".to_string(),
                    String::new(),
                    "sqlite".to_string(),
                ],
            },
        )
        .expect("save");

        assert_eq!(saved.full_name.as_deref(), Some("Sam"));
        assert_eq!(saved.project_type.as_deref(), Some("saas"));
        assert_eq!(saved.interests, vec!["rust", "sqlite"]);
        assert_eq!(load(&test.context, "U").expect("load").interests, saved.interests);
    }

    #[test]
    fn unknown_project_type_is_rejected() {
        let test = test_context(Arc::new(ScriptedGenerator::default()));
        let result = save(
            &test.context,
            "U",
            Profile {
                project_type: Some("astronaut".to_string()),
                ..Profile::default()
            },
        );

        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
