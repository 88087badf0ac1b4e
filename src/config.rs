use anyhow::{Context, Result, anyhow, bail};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

const APP_DIR: &str = ".MyMap";
const CONFIG_FILE: &str = "config.json";
const CATEGORIES_FILE: &str = "categories.json";
pub const DEFAULT_RETENTION_DAYS: u32 = 14;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_port: u16,
    pub db_path: PathBuf,
    pub categories_path: PathBuf,
    pub retention_days: u32,
    pub max_upload_mb: usize,
    pub ai_api_key: Option<String>,
    pub ai_api_base_url: String,
    pub ai_primary_model: String,
    pub ai_fallback_model: String,
    pub ai_timeout_seconds: u64,
    pub summary_temperature: f32,
    pub extraction_temperature: f32,
    pub search_api_key: Option<String>,
    pub search_api_base_url: String,
    pub feed_user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        let root = default_root_dir();

        Self {
            api_port: 7878,
            db_path: root.join("db").join("mymap.db"),
            categories_path: root.join(CATEGORIES_FILE),
            retention_days: DEFAULT_RETENTION_DAYS,
            max_upload_mb: 25,
            ai_api_key: None,
            ai_api_base_url: "https://api.openai.com/v1".to_string(),
            ai_primary_model: "gpt-5-codex".to_string(),
            ai_fallback_model: "gpt-4o-mini".to_string(),
            ai_timeout_seconds: 60,
            summary_temperature: 0.2,
            extraction_temperature: 0.1,
            search_api_key: None,
            search_api_base_url: "https://api.tavily.com".to_string(),
            feed_user_agent: "my-map/0.1".to_string(),
        }
    }
}

impl Config {
    pub fn root_dir() -> Result<PathBuf> {
        Ok(default_root_dir())
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(default_root_dir().join(CONFIG_FILE))
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))
    }

    pub fn load_or_default() -> Result<Self> {
        Self::load_or_default_at(&Self::config_path()?)
    }

    /// Creates the default config only when no file exists yet. A file that
    /// fails to parse is reported and left untouched.
    pub fn load_or_default_at(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            return Self::load_from(config_path);
        }

        let config = Self::default();
        config.ensure_bootstrap_files()?;
        config.save_to(config_path)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;
        set_mode_600(config_path)?;

        Ok(())
    }

    pub fn ensure_bootstrap_files(&self) -> Result<()> {
        let root = Self::root_dir()?;
        fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create root directory: {}", root.display()))?;

        if let Some(parent) = self.db_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        if !self.categories_path.exists() {
            fs::write(&self.categories_path, "{\n  \"domains\": {}\n}\n").with_context(|| {
                format!(
                    "Failed to create default categories file: {}",
                    self.categories_path.display()
                )
            })?;
            set_mode_600(&self.categories_path)?;
        }

        Ok(())
    }

    /// API key for the text-generation backend. Environment wins over the file.
    pub fn resolve_ai_api_key(&self) -> Option<String> {
        first_env(&["MYMAP_AI_API_KEY", "OPENAI_API_KEY"]).or_else(|| non_blank(&self.ai_api_key))
    }

    pub fn resolve_search_api_key(&self) -> Option<String> {
        first_env(&["MYMAP_SEARCH_API_KEY", "TAVILY_API_KEY"])
            .or_else(|| non_blank(&self.search_api_key))
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.max(1) * 1024 * 1024
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        match normalize_config_key(key) {
            "api_port" => {
                self.api_port = value
                    .parse::<u16>()
                    .map_err(|_| anyhow!("api_port must be a number"))?;
            }
            "db_path" => {
                self.db_path = expand_home(value);
            }
            "categories_path" => {
                self.categories_path = expand_home(value);
            }
            "retention_days" => {
                let parsed = value
                    .parse::<u32>()
                    .map_err(|_| anyhow!("retention_days must be a number"))?;
                if parsed == 0 {
                    bail!("retention_days must be at least 1");
                }
                self.retention_days = parsed;
            }
            "max_upload_mb" => {
                self.max_upload_mb = value
                    .parse::<usize>()
                    .map_err(|_| anyhow!("max_upload_mb must be a number"))?
                    .max(1);
            }
            "ai_api_key" => {
                self.ai_api_key = (!value.trim().is_empty()).then_some(value.to_string());
            }
            "ai_api_base_url" => {
                self.ai_api_base_url = value.trim().trim_end_matches('/').to_string();
            }
            "ai_primary_model" => {
                self.ai_primary_model = non_empty_setting("ai_primary_model", value)?;
            }
            "ai_fallback_model" => {
                self.ai_fallback_model = non_empty_setting("ai_fallback_model", value)?;
            }
            "ai_timeout_seconds" => {
                self.ai_timeout_seconds = value
                    .parse::<u64>()
                    .map_err(|_| anyhow!("ai_timeout_seconds must be a number"))?
                    .max(5);
            }
            "summary_temperature" => {
                self.summary_temperature = parse_temperature("summary_temperature", value)?;
            }
            "extraction_temperature" => {
                self.extraction_temperature = parse_temperature("extraction_temperature", value)?;
            }
            "search_api_key" => {
                self.search_api_key = (!value.trim().is_empty()).then_some(value.to_string());
            }
            "search_api_base_url" => {
                self.search_api_base_url = value.trim().trim_end_matches('/').to_string();
            }
            "feed_user_agent" => {
                self.feed_user_agent = non_empty_setting("feed_user_agent", value)?;
            }
            _ => {
                bail!(
                    "Unsupported config key: {key}. Supported keys: api_port|api.port, db_path|db.path, categories_path|categories.path, retention_days|retention.days, max_upload_mb|ingest.max_upload_mb, ai_api_key|ai.api_key, ai_api_base_url|ai.base_url, ai_primary_model|ai.model, ai_fallback_model|ai.fallback_model, ai_timeout_seconds|ai.timeout_seconds, summary_temperature|ai.summary_temperature, extraction_temperature|ai.extraction_temperature, search_api_key|search.api_key, search_api_base_url|search.base_url, feed_user_agent|feeds.user_agent"
                );
            }
        }

        Ok(())
    }

    pub fn get_value(&self, key: &str) -> Option<String> {
        match normalize_config_key(key) {
            "api_port" => Some(self.api_port.to_string()),
            "db_path" => Some(self.db_path.display().to_string()),
            "categories_path" => Some(self.categories_path.display().to_string()),
            "retention_days" => Some(self.retention_days.to_string()),
            "max_upload_mb" => Some(self.max_upload_mb.to_string()),
            "ai_api_key" => Some(mask_secret(&self.ai_api_key)),
            "ai_api_base_url" => Some(self.ai_api_base_url.clone()),
            "ai_primary_model" => Some(self.ai_primary_model.clone()),
            "ai_fallback_model" => Some(self.ai_fallback_model.clone()),
            "ai_timeout_seconds" => Some(self.ai_timeout_seconds.to_string()),
            "summary_temperature" => Some(self.summary_temperature.to_string()),
            "extraction_temperature" => Some(self.extraction_temperature.to_string()),
            "search_api_key" => Some(mask_secret(&self.search_api_key)),
            "search_api_base_url" => Some(self.search_api_base_url.clone()),
            "feed_user_agent" => Some(self.feed_user_agent.clone()),
            _ => None,
        }
    }
}

fn normalize_config_key(key: &str) -> &str {
    match key {
        "api_port" | "api.port" => "api_port",
        "db_path" | "db.path" => "db_path",
        "categories_path" | "categories.path" => "categories_path",
        "retention_days" | "retention.days" => "retention_days",
        "max_upload_mb" | "ingest.max_upload_mb" => "max_upload_mb",
        "ai_api_key" | "ai.api_key" => "ai_api_key",
        "ai_api_base_url" | "ai.base_url" => "ai_api_base_url",
        "ai_primary_model" | "ai.model" => "ai_primary_model",
        "ai_fallback_model" | "ai.fallback_model" => "ai_fallback_model",
        "ai_timeout_seconds" | "ai.timeout_seconds" => "ai_timeout_seconds",
        "summary_temperature" | "ai.summary_temperature" => "summary_temperature",
        "extraction_temperature" | "ai.extraction_temperature" => "extraction_temperature",
        "search_api_key" | "search.api_key" => "search_api_key",
        "search_api_base_url" | "search.base_url" => "search_api_base_url",
        "feed_user_agent" | "feeds.user_agent" => "feed_user_agent",
        _ => key,
    }
}

fn parse_temperature(name: &str, value: &str) -> Result<f32> {
    let parsed = value
        .parse::<f32>()
        .map_err(|_| anyhow!("{name} must be a number"))?;
    if !(0.0..=2.0).contains(&parsed) {
        bail!("{name} must be between 0.0 and 2.0");
    }
    Ok(parsed)
}

fn non_empty_setting(name: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        bail!("{name} cannot be empty");
    }
    Ok(trimmed.to_string())
}

fn mask_secret(value: &Option<String>) -> String {
    value
        .as_ref()
        .map(|_| "***set***".to_string())
        .unwrap_or_else(|| "not_set".to_string())
}

fn first_env(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|value| !value.trim().is_empty())
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value.clone().filter(|value| !value.trim().is_empty())
}

pub fn expand_home(raw: &str) -> PathBuf {
    raw.strip_prefix("~/")
        .and_then(|stripped| home_dir().map(|home| home.join(stripped)))
        .unwrap_or_else(|| PathBuf::from(raw))
}

fn default_root_dir() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn set_mode_600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to set file permissions: {}", path.display()))?;
    }

    Ok(())
}
