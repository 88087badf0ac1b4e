pub mod prompts;

use crate::config::Config;
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum AiError {
    #[error("primary model failed: {primary}; fallback model failed: {fallback}")]
    Generation { primary: String, fallback: String },
    #[error("{reason}")]
    Parse { reason: String, content: String },
}

#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub system: &'a str,
    pub user: &'a str,
    pub model: &'a str,
    pub temperature: f32,
}

/// A chat-style text generation backend.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// OpenAI-compatible `/chat/completions` client.
pub struct OpenAiClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiClient {
    pub fn from_config(config: &Config) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.ai_timeout_seconds.max(5)))
            .build()
            .context("Failed to create AI HTTP client")?;

        Ok(Self {
            http,
            base_url: config.ai_api_base_url.trim_end_matches('/').to_string(),
            api_key: config.resolve_ai_api_key(),
        })
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .context("AI API key is missing")?;

        let endpoint = format!("{}/chat/completions", self.base_url);
        let request_body = json!({
            "model": request.model,
            "temperature": request.temperature,
            "messages": [
                {"role": "system", "content": request.system},
                {"role": "user", "content": request.user}
            ]
        });

        let response = self
            .http
            .post(endpoint)
            .bearer_auth(api_key)
            .json(&request_body)
            .send()
            .await
            .context("AI API request failed")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read AI response body")?;

        if !status.is_success() {
            bail!("AI API error {}: {}", status, body);
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&body)
            .with_context(|| format!("Failed to parse AI response: {body}"))?;

        parsed
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| anyhow!("AI response did not include message.content"))
    }
}

/// One round trip against the primary model.
pub async fn test_connection(config: &Config) -> Result<String> {
    let client = OpenAiClient::from_config(config)?;
    client
        .generate(GenerationRequest {
            system: prompts::HEALTH_CHECK,
            user: "ping",
            model: &config.ai_primary_model,
            temperature: 0.0,
        })
        .await
}

/// A backend plus the model it should be asked for.
#[derive(Clone)]
pub struct Route {
    pub backend: Arc<dyn TextGenerator>,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Generated {
    pub text: String,
    /// Set when the primary route failed and the fallback answered.
    pub primary_error: Option<String>,
}

impl Generated {
    pub fn used_fallback(&self) -> bool {
        self.primary_error.is_some()
    }
}

#[derive(Clone)]
pub struct Summarizer {
    primary: Route,
    fallback: Route,
    summary_temperature: f32,
    extraction_temperature: f32,
}

impl Summarizer {
    pub fn new(
        primary: Route,
        fallback: Route,
        summary_temperature: f32,
        extraction_temperature: f32,
    ) -> Self {
        Self {
            primary,
            fallback,
            summary_temperature,
            extraction_temperature,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let backend: Arc<dyn TextGenerator> = Arc::new(OpenAiClient::from_config(config)?);

        Ok(Self::new(
            Route {
                backend: Arc::clone(&backend),
                model: config.ai_primary_model.clone(),
            },
            Route {
                backend,
                model: config.ai_fallback_model.clone(),
            },
            config.summary_temperature,
            config.extraction_temperature,
        ))
    }

    /// Markdown-producing call at the summary temperature.
    pub async fn generate_text(&self, system: &str, user: &str) -> Result<Generated, AiError> {
        self.generate_at(system, user, self.summary_temperature)
            .await
    }

    pub async fn generate_at(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
    ) -> Result<Generated, AiError> {
        let primary_error = match attempt(&self.primary, system, user, temperature).await {
            Ok(text) => {
                return Ok(Generated {
                    text,
                    primary_error: None,
                });
            }
            Err(error) => format!("{error:#}"),
        };

        warn!(
            model = self.primary.model,
            fallback = self.fallback.model,
            error = %primary_error,
            "primary model failed, retrying with fallback"
        );

        match attempt(&self.fallback, system, user, temperature).await {
            Ok(text) => {
                info!(model = self.fallback.model, "fallback model answered");
                Ok(Generated {
                    text,
                    primary_error: Some(primary_error),
                })
            }
            Err(error) => Err(AiError::Generation {
                primary: primary_error,
                fallback: format!("{error:#}"),
            }),
        }
    }

    /// Structured call at the extraction temperature. Shape mismatches are not
    /// retried.
    pub async fn generate_json<T: DeserializeOwned>(
        &self,
        system: &str,
        user: &str,
    ) -> Result<T, AiError> {
        let generated = self
            .generate_at(system, user, self.extraction_temperature)
            .await?;

        parse_json_payload(&generated.text)
    }
}

async fn attempt(route: &Route, system: &str, user: &str, temperature: f32) -> Result<String> {
    let text = route
        .backend
        .generate(GenerationRequest {
            system,
            user,
            model: &route.model,
            temperature,
        })
        .await?;

    let text = text.trim();
    if text.is_empty() {
        bail!("model {} returned empty content", route.model);
    }

    Ok(text.to_string())
}

pub fn parse_json_payload<T: DeserializeOwned>(content: &str) -> Result<T, AiError> {
    let extracted = extract_json_block(content);
    serde_json::from_str(&extracted).map_err(|error| AiError::Parse {
        reason: format!("Failed to parse model JSON payload: {error}"),
        content: content.to_string(),
    })
}

/// Pulls the JSON document out of fenced or chatty model output.
pub fn extract_json_block(content: &str) -> String {
    let fenced = content.split("```").map(str::trim).find_map(|block| {
        block
            .strip_prefix("json")
            .map(str::trim)
            .or_else(|| (block.starts_with('{') || block.starts_with('[')).then_some(block))
    });

    if let Some(block) = fenced {
        return block.to_string();
    }

    let first = content.find(['{', '[']);
    let closing = match first.map(|index| &content[index..index + 1]) {
        Some("[") => ']',
        _ => '}',
    };
    let last = content.rfind(closing);

    match (first, last) {
        (Some(start), Some(end)) if end > start => content[start..=end].to_string(),
        _ => content.trim().to_string(),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{GenerationRequest, Route, Summarizer, TextGenerator};
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};

    pub const PRIMARY: &str = "primary-model";
    pub const FALLBACK: &str = "fallback-model";

    #[derive(Debug, Clone, PartialEq)]
    pub struct RecordedCall {
        pub model: String,
        pub system: String,
        pub user: String,
        pub temperature: f32,
    }

    /// Replies from a per-model queue; an empty queue is a failure.
    #[derive(Default)]
    pub struct ScriptedGenerator {
        replies: Mutex<HashMap<String, VecDeque<Result<String, String>>>>,
        calls: Mutex<Vec<RecordedCall>>,
    }

    impl ScriptedGenerator {
        pub fn reply(self, model: &str, reply: Result<&str, &str>) -> Self {
            self.replies
                .lock()
                .expect("replies lock")
                .entry(model.to_string())
                .or_default()
                .push_back(reply.map(str::to_string).map_err(str::to_string));
            self
        }

        pub fn calls(&self) -> Vec<RecordedCall> {
            self.calls.lock().expect("calls lock").clone()
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, request: GenerationRequest<'_>) -> Result<String> {
            self.calls.lock().expect("calls lock").push(RecordedCall {
                model: request.model.to_string(),
                system: request.system.to_string(),
                user: request.user.to_string(),
                temperature: request.temperature,
            });

            self.replies
                .lock()
                .expect("replies lock")
                .get_mut(request.model)
                .and_then(VecDeque::pop_front)
                .unwrap_or_else(|| Err(format!("no scripted reply for {}", request.model)))
                .map_err(|error| anyhow!(error))
        }
    }

    pub fn summarizer(generator: Arc<ScriptedGenerator>) -> Summarizer {
        Summarizer::new(
            Route {
                backend: generator.clone(),
                model: PRIMARY.to_string(),
            },
            Route {
                backend: generator,
                model: FALLBACK.to_string(),
            },
            0.2,
            0.1,
        )
    }
}
