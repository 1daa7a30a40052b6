//! Chat completion against an OpenAI-compatible endpoint.
//!
//! A safety filter rejecting the prompt or the completion surfaces as
//! [`Error::ContentPolicy`] and is never retried. Filter annotations that
//! did not block the response are returned as `safety_flags`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::GenerationConfig;
use crate::error::{Error, Result};
use crate::prompt::PromptPayload;

/// Sampling parameters for one completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl ModelParams {
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    /// Non-blocking filter annotations, formatted `category:severity`.
    pub safety_flags: Vec<String>,
}

#[async_trait]
pub trait Generator: Send + Sync {
    fn model_name(&self) -> &str;

    async fn complete(&self, prompt: &PromptPayload, params: &ModelParams) -> Result<Completion>;
}

/// Used when `generation.provider = "disabled"`.
pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _prompt: &PromptPayload, _params: &ModelParams) -> Result<Completion> {
        Err(Error::Generation(
            "generation provider is disabled; set [generation] provider in config".to_string(),
        ))
    }
}

pub struct OpenAiGenerator {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
    max_retries: u32,
}

impl OpenAiGenerator {
    /// Create a client from configuration, reading `OPENAI_API_KEY`.
    pub fn from_env(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| Error::Config("OPENAI_API_KEY environment variable not set".into()))?;
        Self::new(config, api_key)
    }

    pub fn new(config: &GenerationConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            max_retries: config.max_retries,
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: &'a [crate::prompt::PromptMessage],
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    prompt_filter_results: Vec<PromptFilterResult>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<AssistantMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
    #[serde(default)]
    content_filter_results: FilterResults,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PromptFilterResult {
    #[serde(default)]
    content_filter_results: FilterResults,
}

type FilterResults = BTreeMap<String, FilterVerdict>;

#[derive(Debug, Deserialize)]
struct FilterVerdict {
    #[serde(default)]
    filtered: bool,
    #[serde(default)]
    severity: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Fold one set of filter verdicts into `flags`, failing on any block.
fn apply_filters(stage: &str, results: &FilterResults, flags: &mut Vec<String>) -> Result<()> {
    for (category, verdict) in results {
        if verdict.filtered {
            return Err(Error::ContentPolicy(format!(
                "{} rejected by {} filter",
                stage, category
            )));
        }
        if let Some(severity) = verdict.severity.as_deref() {
            if severity != "safe" {
                flags.push(format!("{}:{}", category, severity));
            }
        }
    }
    Ok(())
}

/// Turn a successful response body into a [`Completion`].
fn parse_completion(response: ChatResponse) -> Result<Completion> {
    let mut safety_flags = Vec::new();
    for prompt_result in &response.prompt_filter_results {
        apply_filters("prompt", &prompt_result.content_filter_results, &mut safety_flags)?;
    }

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| Error::Generation("response contained no choices".to_string()))?;

    if choice.finish_reason.as_deref() == Some("content_filter") {
        return Err(Error::ContentPolicy(
            "completion rejected by content filter".to_string(),
        ));
    }
    apply_filters("completion", &choice.content_filter_results, &mut safety_flags)?;

    let text = choice
        .message
        .and_then(|m| m.content)
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| Error::Generation("response contained no text".to_string()))?;

    Ok(Completion { text, safety_flags })
}

/// Map an error body to [`Error::ContentPolicy`] when it names a filter.
fn policy_error(body: &str) -> Option<Error> {
    let parsed: ApiErrorBody = serde_json::from_str(body).ok()?;
    match parsed.error.code.as_deref() {
        Some("content_filter") | Some("content_policy_violation") => Some(Error::ContentPolicy(
            parsed
                .error
                .message
                .unwrap_or_else(|| "prompt rejected by content filter".to_string()),
        )),
        _ => None,
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &PromptPayload, params: &ModelParams) -> Result<Completion> {
        let body = ChatRequest {
            model: &self.model,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            messages: &prompt.messages,
        };

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await;

            let response = match resp {
                Ok(response) => response,
                Err(e) => {
                    warn!(error = %e, attempt, "chat completion request failed");
                    last_err = Some(Error::Generation(e.to_string()));
                    continue;
                }
            };

            let status = response.status();
            if status.is_success() {
                let parsed: ChatResponse = response
                    .json()
                    .await
                    .map_err(|e| Error::Generation(format!("invalid completion response: {}", e)))?;
                let completion = parse_completion(parsed)?;
                debug!(
                    model = %self.model,
                    flags = completion.safety_flags.len(),
                    "completion received"
                );
                return Ok(completion);
            }

            let body_text = response.text().await.unwrap_or_default();
            if let Some(err) = policy_error(&body_text) {
                return Err(err);
            }

            let err = Error::Generation(format!("chat API error {}: {}", status, body_text));
            if status.as_u16() == 429 || status.is_server_error() {
                warn!(%status, attempt, "chat completion request failed");
                last_err = Some(err);
                continue;
            }
            return Err(err);
        }

        Err(last_err.unwrap_or_else(|| Error::Generation("failed after retries".to_string())))
    }
}

/// Create the [`Generator`] named by `generation.provider`.
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledGenerator)),
        "openai" => Ok(Arc::new(OpenAiGenerator::from_env(config)?)),
        other => Err(Error::Config(format!("unknown generation provider: {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<Completion> {
        parse_completion(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn test_plain_completion() {
        let completion = parse(
            r#"{"choices":[{"message":{"role":"assistant","content":"We are hiring!"},"finish_reason":"stop"}]}"#,
        )
        .unwrap();
        assert_eq!(completion.text, "We are hiring!");
        assert!(completion.safety_flags.is_empty());
    }

    #[test]
    fn test_finish_reason_content_filter() {
        let err = parse(
            r#"{"choices":[{"message":{"content":null},"finish_reason":"content_filter"}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::ContentPolicy(_)));
    }

    #[test]
    fn test_filtered_prompt_is_policy_error() {
        let err = parse(
            r#"{"choices":[],"prompt_filter_results":[{"prompt_index":0,"content_filter_results":{"hate":{"filtered":true,"severity":"high"}}}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::ContentPolicy(_)));
    }

    #[test]
    fn test_unblocked_annotations_become_flags() {
        let completion = parse(
            r#"{"choices":[{"message":{"content":"Posting"},"finish_reason":"stop",
                "content_filter_results":{"hate":{"filtered":false,"severity":"safe"},
                                          "violence":{"filtered":false,"severity":"low"}}}]}"#,
        )
        .unwrap();
        assert_eq!(completion.safety_flags, vec!["violence:low".to_string()]);
    }

    #[test]
    fn test_empty_text_is_generation_error() {
        let err = parse(r#"{"choices":[{"message":{"content":"  "}}]}"#).unwrap_err();
        assert!(matches!(err, Error::Generation(_)));
        let err = parse(r#"{"choices":[]}"#).unwrap_err();
        assert!(matches!(err, Error::Generation(_)));
    }

    #[test]
    fn test_policy_error_codes() {
        assert!(matches!(
            policy_error(r#"{"error":{"code":"content_filter","message":"blocked"}}"#),
            Some(Error::ContentPolicy(m)) if m == "blocked"
        ));
        assert!(policy_error(r#"{"error":{"code":"content_policy_violation"}}"#).is_some());
        assert!(policy_error(r#"{"error":{"code":"rate_limit_exceeded"}}"#).is_none());
        assert!(policy_error("not json").is_none());
    }

    #[test]
    fn test_model_params_from_config() {
        let params = ModelParams::from_config(&GenerationConfig::default());
        assert_eq!(params.max_tokens, 1000);
        assert!((params.temperature - 0.1).abs() < f32::EPSILON);
    }
}
