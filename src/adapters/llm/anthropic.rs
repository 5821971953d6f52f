//! Anthropic Messages API adapter for test synthesis and smell classification.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::prompts::{classify_prompt, generate_prompt, repair_prompt, SYSTEM_PROMPT};
use crate::adapters::executor::script::sanitize_test_body;
use crate::domain::errors::{DomainError, DomainResult, SynthesisError};
use crate::domain::models::{SourceUnit, SynthesisConfig};
use crate::domain::ports::{
    Classification, DefectReport, SmellClassifier, SynthesisContext, SynthesisService,
};

const API_VERSION: &str = "2023-06-01";

/// Configuration for the Anthropic client.
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl AnthropicConfig {
    /// Resolve from configuration, falling back to `ANTHROPIC_API_KEY`.
    pub fn from_settings(settings: &SynthesisConfig) -> DomainResult<Self> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|key| !key.is_empty())
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
            .ok_or_else(|| {
                DomainError::ValidationFailed(
                    "ANTHROPIC_API_KEY not set. Set the env var or synthesis.api_key.".to_string(),
                )
            })?;

        Ok(Self {
            api_key,
            base_url: settings.base_url.clone(),
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            timeout_secs: settings.timeout_secs,
        })
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

/// Thin Messages API client shared by the synthesis and classifier adapters.
pub struct AnthropicClient {
    config: AnthropicConfig,
    client: Client,
}

impl AnthropicClient {
    pub fn new(config: AnthropicConfig) -> DomainResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DomainError::ValidationFailed(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    /// Send one user turn and return the concatenated text blocks.
    pub async fn complete(&self, prompt: &str) -> Result<String, SynthesisError> {
        let request = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            system: SYSTEM_PROMPT,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.config.base_url.trim_end_matches('/')))
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SynthesisError::Timeout(self.config.timeout_secs)
                } else {
                    SynthesisError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status(status, body));
        }

        let result: MessagesResponse = response
            .json()
            .await
            .map_err(|e| SynthesisError::MalformedResponse(e.to_string()))?;

        let text = result
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");
        debug!(chars = text.len(), model = %self.config.model, "Messages API call completed");
        Ok(text)
    }
}

fn map_status(status: StatusCode, body: String) -> SynthesisError {
    match status.as_u16() {
        400 | 404 | 413 | 422 => SynthesisError::InvalidRequest(format!("{status}: {body}")),
        401 | 403 => SynthesisError::Auth(format!("{status}: {body}")),
        429 => SynthesisError::RateLimited(body),
        _ => SynthesisError::Unavailable(format!("{status}: {body}")),
    }
}

fn non_empty_body(raw: &str) -> Result<String, SynthesisError> {
    let body = sanitize_test_body(raw);
    if body.trim().is_empty() {
        Err(SynthesisError::EmptyResponse)
    } else {
        Ok(body)
    }
}

/// Synthesis service backed by the Messages API.
pub struct AnthropicSynthesis {
    client: Arc<AnthropicClient>,
}

impl AnthropicSynthesis {
    pub fn new(client: Arc<AnthropicClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SynthesisService for AnthropicSynthesis {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    #[instrument(skip_all, fields(uncovered = context.uncovered.len()))]
    async fn generate(&self, context: &SynthesisContext) -> Result<String, SynthesisError> {
        let raw = self.client.complete(&generate_prompt(context)).await?;
        non_empty_body(&raw)
    }

    #[instrument(skip_all)]
    async fn repair(
        &self,
        context: &SynthesisContext,
        candidate: &str,
        defects: &DefectReport,
    ) -> Result<String, SynthesisError> {
        let raw = self
            .client
            .complete(&repair_prompt(context, candidate, defects))
            .await?;
        non_empty_body(&raw)
    }
}

/// Smell classifier backed by the Messages API.
pub struct AnthropicSmellClassifier {
    client: Arc<AnthropicClient>,
}

impl AnthropicSmellClassifier {
    pub fn new(client: Arc<AnthropicClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SmellClassifier for AnthropicSmellClassifier {
    async fn classify(&self, source: &SourceUnit, test_body: &str) -> DomainResult<Classification> {
        let raw = self
            .client
            .complete(&classify_prompt(source.content(), test_body))
            .await
            .map_err(|e| DomainError::ClassificationFailed(e.to_string()))?;
        parse_classification(&raw)
    }
}

#[derive(Debug, Deserialize)]
struct RouterVerdict {
    destination: String,
    #[serde(default)]
    identified_smells: String,
}

/// Parse the classifier's JSON verdict, tolerating surrounding prose or fences.
pub fn parse_classification(raw: &str) -> DomainResult<Classification> {
    let start = raw.find('{');
    let end = raw.rfind('}');
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &raw[start..=end],
        _ => {
            return Err(DomainError::ClassificationFailed(
                "response contains no JSON object".to_string(),
            ))
        }
    };

    let verdict: RouterVerdict = serde_json::from_str(json)
        .map_err(|e| DomainError::ClassificationFailed(format!("invalid verdict JSON: {e}")))?;

    match verdict.destination.trim() {
        "keep_good_test" => Ok(Classification::acceptable()),
        "fix_test_smell" => Ok(Classification::needs_fix(verdict.identified_smells)),
        other => Err(DomainError::ClassificationFailed(format!(
            "unknown destination '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::Verdict;

    #[test]
    fn test_parse_fix_verdict_inside_fence() {
        let raw = "```json\n{\"destination\": \"fix_test_smell\", \"identified_smells\": \"Magic numbers\"}\n```";
        let classification = parse_classification(raw).unwrap();
        assert_eq!(classification.verdict, Verdict::NeedsFix);
        assert_eq!(classification.defects, "Magic numbers");
    }

    #[test]
    fn test_parse_keep_verdict() {
        let raw = r#"{"destination": "keep_good_test", "identified_smells": "No test smells found."}"#;
        assert_eq!(parse_classification(raw).unwrap().verdict, Verdict::Acceptable);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_classification("looks fine to me").is_err());
        assert!(parse_classification(r#"{"destination": "maybe"}"#).is_err());
    }

    #[test]
    fn test_status_mapping() {
        assert!(map_status(StatusCode::TOO_MANY_REQUESTS, String::new()).is_transient());
        assert!(map_status(StatusCode::SERVICE_UNAVAILABLE, String::new()).is_transient());
        assert!(!map_status(StatusCode::UNAUTHORIZED, String::new()).is_transient());
        assert!(!map_status(StatusCode::BAD_REQUEST, String::new()).is_transient());
    }

    #[test]
    fn test_missing_api_key_is_validation_error() {
        temp_env::with_var("ANTHROPIC_API_KEY", None::<&str>, || {
            let err = AnthropicConfig::from_settings(&SynthesisConfig::default()).unwrap_err();
            assert!(matches!(err, DomainError::ValidationFailed(_)));
        });
    }

    #[test]
    fn test_empty_fenced_body_is_empty_response() {
        assert_eq!(non_empty_body("```python\n```"), Err(SynthesisError::EmptyResponse));
    }
}
