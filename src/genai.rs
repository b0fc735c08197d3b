//! Generative-language (Gemini) API client used for LLM OCR and translation.

use crate::config::GenAiConfig;
use crate::error::{PipelineError, PipelineResult};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// A model that answers `generateContent` requests.
///
/// Implementations return `Err(PipelineError::Transport)` for any transport or
/// HTTP-level failure. A successful reply whose body has an unexpected shape is
/// returned as an empty [`GenerateResponse`], never as an error.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    fn name(&self) -> &str;
    async fn generate(&self, request: &GenerateRequest) -> PipelineResult<GenerateResponse>;
}

/// HTTP client for `{base_url}/v1/models/{model}:generateContent`.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    config: GenAiConfig,
}

impl GeminiClient {
    pub fn new(client: Client, config: GenAiConfig) -> Self {
        Self { client, config }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/models/{}:generateContent",
            self.config.base_url, self.config.model
        )
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn generate(&self, request: &GenerateRequest) -> PipelineResult<GenerateResponse> {
        debug!(
            "Sending request to generative-language API: model={}, inline={:?}, json={}",
            self.config.model,
            request.inline_mime_type(),
            request.generation_config.is_some()
        );

        let response = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                PipelineError::Transport(format!(
                    "Failed to send request to generative-language API: {}",
                    e.without_url()
                ))
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(PipelineError::Transport(error_message(status, &body)));
        }

        let parsed: GenerateResponse = serde_json::from_str(&body).unwrap_or_else(|e| {
            warn!("Unexpected generative-language response shape: {}", e);
            GenerateResponse::default()
        });

        if let Some(usage) = &parsed.usage_metadata {
            info!(
                "Generative-language response: {} tokens (prompt: {}, candidates: {})",
                usage.total_token_count, usage.prompt_token_count, usage.candidates_token_count
            );
        }

        Ok(parsed)
    }
}

/// Prefer the backend's own `error.message`, fall back to the status line.
fn error_message(status: StatusCode, body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorEnvelope {
        error: ErrorBody,
    }
    #[derive(Deserialize)]
    struct ErrorBody {
        message: String,
    }

    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) if !envelope.error.message.is_empty() => {
            format!("Generative-language API error ({}): {}", status, envelope.error.message)
        }
        _ => format!(
            "Generative-language API error ({}): {}",
            status,
            status.canonical_reason().unwrap_or("request failed")
        ),
    }
}

// ============================================================================
// Request types
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Content {
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Part {
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    Text {
        text: String,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    /// Base64-encoded file content.
    pub data: String,
}

/// Structured-output settings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_mime_type: String,
    pub response_schema: serde_json::Value,
}

impl GenerateRequest {
    /// One file part followed by one instruction part.
    pub fn inline(
        mime_type: impl Into<String>,
        base64_data: impl Into<String>,
        instruction: impl Into<String>,
    ) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: mime_type.into(),
                            data: base64_data.into(),
                        },
                    },
                    Part::Text {
                        text: instruction.into(),
                    },
                ],
            }],
            generation_config: None,
        }
    }

    /// A single text prompt.
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![Part::Text {
                    text: prompt.into(),
                }],
            }],
            generation_config: None,
        }
    }

    /// Ask for a JSON reply conforming to `schema`.
    pub fn with_json_schema(mut self, schema: serde_json::Value) -> Self {
        self.generation_config = Some(GenerationConfig {
            response_mime_type: "application/json".to_string(),
            response_schema: schema,
        });
        self
    }

    /// MIME type of the first inline file part, if any.
    pub fn inline_mime_type(&self) -> Option<&str> {
        self.parts().find_map(|p| match p {
            Part::InlineData { inline_data } => Some(inline_data.mime_type.as_str()),
            Part::Text { .. } => None,
        })
    }

    /// Concatenated text parts of the request.
    #[cfg(test)]
    pub fn prompt_text(&self) -> String {
        self.parts()
            .filter_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                Part::InlineData { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn parts(&self) -> impl Iterator<Item = &Part> {
        self.contents.iter().flat_map(|c| c.parts.iter())
    }
}

// ============================================================================
// Response types
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponsePart {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u32,
    #[serde(default)]
    pub candidates_token_count: u32,
    #[serde(default)]
    pub total_token_count: u32,
}

impl GenerateResponse {
    /// Non-empty text parts of the first candidate, joined by newlines.
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .filter(|t| !t.is_empty())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default()
    }

    /// A reply carrying `text` as its single part.
    #[cfg(test)]
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            candidates: vec![Candidate {
                content: Some(CandidateContent {
                    parts: vec![ResponsePart {
                        text: Some(text.into()),
                    }],
                }),
            }],
            usage_metadata: None,
        }
    }
}
