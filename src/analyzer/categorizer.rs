use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[serde(alias = "development", alias = "dev")]
    Work,
    #[serde(alias = "research", alias = "education")]
    Learn,
    News,
    #[serde(alias = "sns")]
    Social,
    Entertainment,
    Shopping,
    Other,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Work => "work",
            Category::Learn => "learn",
            Category::News => "news",
            Category::Social => "social",
            Category::Entertainment => "entertainment",
            Category::Shopping => "shopping",
            Category::Other => "other",
        }
    }

    /// Lenient parse used for stored tags; anything unknown is `Other`.
    pub fn from_tag(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "work" | "development" | "dev" => Category::Work,
            "learn" | "research" | "education" => Category::Learn,
            "news" => Category::News,
            "social" | "sns" => Category::Social,
            "entertainment" => Category::Entertainment,
            "shopping" => Category::Shopping,
            _ => Category::Other,
        }
    }

    /// Work and learn count towards the focus ratio.
    pub fn is_focus(self) -> bool {
        matches!(self, Category::Work | Category::Learn)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const VIDEO_PLATFORMS: [&str; 2] = ["youtube", "youtu"];

// Evaluated in order; the first matching pattern wins.
static VIDEO_TITLE_OVERRIDES: LazyLock<Vec<(Regex, Category)>> = LazyLock::new(|| {
    vec![
        (
            Regex::new(r"(?i)(how to|tutorial|course|learn|guide|coding|programming)")
                .expect("valid learn keyword regex"),
            Category::Learn,
        ),
        (
            Regex::new(r"(?i)(music|trailer|highlights|gaming|reaction|vlog)")
                .expect("valid entertainment keyword regex"),
            Category::Entertainment,
        ),
    ]
});

const COUNTRY_SECOND_LEVELS: [&str; 6] = ["co", "com", "org", "net", "ac", "gov"];

/// Owner-editable domain rules layered over the built-in table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryRules {
    #[serde(default)]
    pub domains: HashMap<String, Category>,
}

impl CategoryRules {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read categories file: {}", path.display()))?;
        let parsed: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse categories file: {}", path.display()))?;

        Ok(parsed.normalized())
    }

    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn categorize(&self, domain: &str, title: Option<&str>) -> Category {
        let normalized = normalize_domain(domain);
        let core = core_name(&normalized);

        if VIDEO_PLATFORMS.contains(&core.as_str()) {
            let overridden = title.and_then(|title| {
                VIDEO_TITLE_OVERRIDES
                    .iter()
                    .find(|(pattern, _)| pattern.is_match(title))
                    .map(|(_, category)| *category)
            });
            if let Some(category) = overridden {
                return category;
            }
        }

        self.domains
            .iter()
            .filter(|(rule, _)| domain_matches(&normalized, rule))
            .max_by_key(|(rule, _)| rule.len())
            .map(|(_, category)| *category)
            .or_else(|| builtin_category(&core))
            .unwrap_or(Category::Other)
    }

    fn normalized(self) -> Self {
        let mut entries = self
            .domains
            .into_iter()
            .map(|(raw, category)| {
                let prefixed = raw.trim().to_lowercase().starts_with("www.");
                (normalize_domain(&raw), prefixed, raw, category)
            })
            .filter(|(key, ..)| !key.is_empty())
            .collect::<Vec<_>>();
        // A plain domain sorts ahead of its `www.` form and keeps the rule.
        entries.sort_by(|a, b| (&a.0, a.1, &a.2).cmp(&(&b.0, b.1, &b.2)));

        let mut domains = HashMap::new();
        for (key, _, _, category) in entries {
            domains.entry(key).or_insert(category);
        }

        Self { domains }
    }
}

/// Categorize with the built-in table only.
pub fn categorize(domain: &str, title: Option<&str>) -> Category {
    CategoryRules::default().categorize(domain, title)
}

/// Registrable label of a host: `docs.github.com` -> `github`,
/// `news.bbc.co.uk` -> `bbc`.
pub fn core_name(domain: &str) -> String {
    let normalized = normalize_domain(domain);
    let labels = normalized
        .split('.')
        .filter(|label| !label.is_empty())
        .collect::<Vec<_>>();

    match labels.as_slice() {
        [] => String::new(),
        [only] => (*only).to_string(),
        [.., third, second, tld]
            if tld.len() == 2 && COUNTRY_SECOND_LEVELS.contains(second) =>
        {
            (*third).to_string()
        }
        [.., second, _tld] => (*second).to_string(),
    }
}

fn normalize_domain(domain: &str) -> String {
    domain.trim().to_lowercase().trim_start_matches("www.").to_string()
}

fn domain_matches(domain: &str, rule: &str) -> bool {
    domain == rule || domain.ends_with(&format!(".{rule}"))
}

fn builtin_category(core: &str) -> Option<Category> {
    let category = match core {
        "github" | "gitlab" | "stackoverflow" | "supabase" | "vercel" | "notion" | "figma"
        | "google" | "atlassian" | "linear" | "slack" => Category::Work,
        "medium" | "dev" | "devto" | "freecodecamp" | "coursera" | "udemy" | "youtube"
        | "youtu" | "wikipedia" | "khanacademy" => Category::Learn,
        "cnn" | "nytimes" | "bloomberg" | "wsj" | "bbc" | "reuters" | "theguardian" => {
            Category::News
        }
        "reddit" | "twitter" | "x" | "instagram" | "tiktok" | "facebook" | "threads" => {
            Category::Social
        }
        "netflix" | "hulu" | "primevideo" | "twitch" | "spotify" | "disneyplus" => {
            Category::Entertainment
        }
        "amazon" | "ebay" | "etsy" | "aliexpress" => Category::Shopping,
        _ => return None,
    };

    Some(category)
}

#[cfg(test)]
mod tests {
    use super::{Category, CategoryRules, categorize, core_name};
    use std::collections::HashMap;

    #[test]
    fn core_name_strips_subdomains_and_suffixes() {
        assert_eq!(core_name("www.github.com"), "github");
        assert_eq!(core_name("docs.github.com"), "github");
        assert_eq!(core_name("news.bbc.co.uk"), "bbc");
        assert_eq!(core_name("x.com"), "x");
        assert_eq!(core_name("localhost"), "localhost");
    }

    #[test]
    fn builtin_table_maps_known_domains() {
        assert_eq!(categorize("github.com", None), Category::Work);
        assert_eq!(categorize("www.nytimes.com", Some("Front page")), Category::News);
        assert_eq!(categorize("reddit.com", None), Category::Social);
        assert_eq!(categorize("amazon.co.uk", None), Category::Shopping);
    }

    #[test]
    fn unknown_domains_fall_back_to_other() {
        assert_eq!(categorize("example.org", Some("tutorial")), Category::Other);
        assert_eq!(categorize("", None), Category::Other);
    }

    #[test]
    fn video_titles_override_platform_default() {
        assert_eq!(
            categorize("www.youtube.com", Some("Rust Tutorial for beginners")),
            Category::Learn
        );
        assert_eq!(
            categorize("youtube.com", Some("Official Trailer")),
            Category::Entertainment
        );
        // learn keywords are checked before entertainment keywords
        assert_eq!(
            categorize("youtube.com", Some("How to mix music")),
            Category::Learn
        );
        assert_eq!(categorize("youtube.com", Some("Cat compilation")), Category::Learn);
    }

    #[test]
    fn categorization_is_deterministic() {
        let first = categorize("m.youtube.com", Some("Gaming highlights"));
        let second = categorize("m.youtube.com", Some("Gaming highlights"));
        assert_eq!(first, second);
    }

    #[test]
    fn owner_rules_use_longest_suffix() {
        let rules = CategoryRules {
            domains: HashMap::from([
                ("google.com".to_string(), Category::Learn),
                ("mail.google.com".to_string(), Category::Social),
            ]),
        };

        assert_eq!(rules.categorize("mail.google.com", None), Category::Social);
        assert_eq!(rules.categorize("scholar.google.com", None), Category::Learn);
        assert_eq!(rules.categorize("github.com", None), Category::Work);
    }

    #[test]
    fn rule_file_accepts_category_aliases() {
        let rules: CategoryRules =
            serde_json::from_str(r#"{"domains":{"WWW.Example.com":"development"}}"#)
                .expect("rules parse");
        let rules = rules.normalized();

        assert_eq!(rules.categorize("example.com", None), Category::Work);
    }

    #[test]
    fn plain_domain_rule_beats_its_www_form() {
        for _ in 0..8 {
            let rules: CategoryRules = serde_json::from_str(
                r#"{"domains":{"www.a.com":"shopping","a.com":"news","www.b.com":"social"}}"#,
            )
            .expect("rules parse");
            let rules = rules.normalized();

            assert_eq!(rules.domains.len(), 2);
            assert_eq!(rules.categorize("a.com", None), Category::News);
            assert_eq!(rules.categorize("b.com", None), Category::Social);
        }
    }

    #[test]
    fn rule_file_rejects_unknown_category() {
        let parsed = serde_json::from_str::<CategoryRules>(r#"{"domains":{"a.com":"gardening"}}"#);
        assert!(parsed.is_err());
    }
}
