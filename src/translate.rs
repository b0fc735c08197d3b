//! Markdown-preserving translation through the generative model.

use crate::error::{PipelineError, PipelineResult};
use crate::genai::{GenerateRequest, GenerativeModel};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

pub const DEFAULT_TARGET_LANG: &str = "en";

/// How the model is asked to shape its reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseMode {
    /// The reply text is the translation.
    #[default]
    Plain,
    /// The reply is a JSON object with a single `translation` string.
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationResult {
    pub translated_text: String,
}

#[derive(Clone)]
pub struct Translator {
    model: Arc<dyn GenerativeModel>,
    mode: ResponseMode,
}

impl Translator {
    pub fn new(model: Arc<dyn GenerativeModel>, mode: ResponseMode) -> Self {
        Self { model, mode }
    }

    /// Translate `text` from `source_lang` to `target_lang` (default `"en"`).
    ///
    /// Whitespace-only input yields an empty translation without calling the
    /// model. Any other failure to obtain translated text is an error.
    pub async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: Option<&str>,
    ) -> PipelineResult<TranslationResult> {
        let source_lang = source_lang.trim();
        if source_lang.is_empty() {
            return Err(PipelineError::Validation("'sourceLang' is required".to_string()));
        }
        let target_lang = target_lang
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(DEFAULT_TARGET_LANG);

        if text.trim().is_empty() {
            debug!("Nothing to translate; returning empty translation");
            return Ok(TranslationResult {
                translated_text: String::new(),
            });
        }

        info!(
            "Translating {} chars from {} to {} via {} ({:?})",
            text.chars().count(),
            source_lang,
            target_lang,
            self.model.name(),
            self.mode
        );

        let request = match self.mode {
            ResponseMode::Plain => GenerateRequest::text(plain_prompt(text, source_lang, target_lang)),
            ResponseMode::Json => GenerateRequest::text(json_prompt(text, source_lang, target_lang))
                .with_json_schema(translation_schema()),
        };

        let raw = self.model.generate(&request).await?.text();

        let translated_text = match self.mode {
            ResponseMode::Plain => raw.trim().to_string(),
            ResponseMode::Json => parse_translation_json(&raw)?,
        };

        if translated_text.is_empty() {
            return Err(PipelineError::MalformedResponse {
                message: "Translation response contained no text".to_string(),
                raw,
            });
        }

        Ok(TranslationResult { translated_text })
    }
}

fn plain_prompt(text: &str, source_lang: &str, target_lang: &str) -> String {
    format!(
        "Translate the following document from {source_lang} to {target_lang}. \
         Output ONLY Markdown preserving structure (headings, lists, tables, emphasis, code blocks) \
         and the hierarchy of the original. No commentary.\n\n---\n{text}"
    )
}

fn json_prompt(text: &str, source_lang: &str, target_lang: &str) -> String {
    format!(
        "Translate the following document from {source_lang} to {target_lang}. \
         Return a JSON object with a single string field \"translation\" whose value is \
         the translated document as Markdown, preserving structure (headings, lists, tables, \
         emphasis, code blocks) and the hierarchy of the original. No commentary.\n\n---\n{text}"
    )
}

fn translation_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "translation": { "type": "STRING" }
        },
        "required": ["translation"]
    })
}

/// Pull the `translation` string out of a JSON reply, tolerating code fences.
fn parse_translation_json(raw: &str) -> PipelineResult<String> {
    let trimmed = raw.trim();
    let json_str = if trimmed.starts_with("```") {
        trimmed
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim()
    } else {
        trimmed
    };

    let value: serde_json::Value =
        serde_json::from_str(json_str).map_err(|e| PipelineError::MalformedResponse {
            message: format!("Translation response is not valid JSON ({})", e),
            raw: raw.to_string(),
        })?;

    value
        .get("translation")
        .and_then(|t| t.as_str())
        .map(|t| t.trim().to_string())
        .ok_or_else(|| PipelineError::MalformedResponse {
            message: "Missing or non-string 'translation' field in translation response".to_string(),
            raw: raw.to_string(),
        })
}
