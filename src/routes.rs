//! HTTP routes for extraction and translation.
//!
//! Uploads arrive either as `multipart/form-data` (field `file`) or as JSON
//! with base64 content (`contentBase64`). Responses use the
//! `{ success, message, data }` envelope.

use crate::config::parse_flag;
use crate::credits::{credits_for_translation, CreditLedger, CreditOperation};
use crate::document::{DocumentService, ExtractionResult, RawDocument};
use crate::error::{PipelineError, PipelineResult};
use crate::translate::DEFAULT_TARGET_LANG;
use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, FromRequest, Multipart, Query, Request, State},
    http::{header::CONTENT_TYPE, HeaderMap},
    response::Json,
    routing::{get, post},
    Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

const ORGANIZATION_HEADER: &str = "x-organization-id";

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub documents: Arc<DocumentService>,
    pub credits: Arc<dyn CreditLedger>,
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/ocr/extract", post(extract))
        .route("/api/document/extract", post(extract))
        .route("/api/ocr/translate-text", post(translate_text))
        .route("/api/document/translate-text", post(translate_text))
        .route("/api/ocr/extract-and-translate", post(extract_and_translate))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// Response envelope
// ============================================================================

#[derive(Serialize)]
struct Envelope<T: Serialize> {
    success: bool,
    message: &'static str,
    data: T,
}

fn ok<T: Serialize>(message: &'static str, data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        message,
        data,
    })
}

// ============================================================================
// Handlers
// ============================================================================

async fn health() -> &'static str {
    "ok"
}

#[derive(Deserialize)]
struct ForceOcrQuery {
    #[serde(rename = "forceOcr")]
    force_ocr: Option<String>,
}

impl ForceOcrQuery {
    /// The query parameter, when present, overrides the body flag.
    fn resolve(&self, body_flag: bool) -> bool {
        self.force_ocr.as_deref().map(parse_flag).unwrap_or(body_flag)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExtractResponse {
    #[serde(flatten)]
    result: ExtractionResult,
    file_name: Option<String>,
    mime_type: Option<String>,
    force_ocr: bool,
}

async fn extract(
    State(state): State<AppState>,
    Query(query): Query<ForceOcrQuery>,
    request: Request,
) -> PipelineResult<Json<Envelope<ExtractResponse>>> {
    let upload = Upload::from_request(request).await?;
    let force_ocr = query.resolve(upload.force_ocr);
    let data = upload.require_data()?;

    let result = state
        .documents
        .extract_text(upload.document(data), force_ocr)
        .await?;

    info!(
        "Extracted {} chars from {:?} ({} warnings)",
        result.text.chars().count(),
        upload.file_name,
        result.warnings.len()
    );

    Ok(ok(
        "Text extracted successfully",
        ExtractResponse {
            result,
            file_name: upload.file_name,
            mime_type: upload.mime_type,
            force_ocr,
        },
    ))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslateBody {
    text: Option<String>,
    source_lang: Option<String>,
    target_lang: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TranslateResponse {
    translation: String,
    source_lang: String,
    target_lang: String,
}

async fn translate_text(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<TranslateBody>, JsonRejection>,
) -> PipelineResult<Json<Envelope<TranslateResponse>>> {
    let Json(body) = payload
        .map_err(|e| PipelineError::Validation(format!("Invalid JSON body: {}", e)))?;

    let text = body.text.filter(|t| !t.trim().is_empty());
    let (text, source_lang) = match (text, non_empty(body.source_lang)) {
        (Some(text), Some(source_lang)) => (text, source_lang),
        _ => {
            return Err(PipelineError::Validation(
                "'text' and 'sourceLang' are required".to_string(),
            ))
        }
    };
    let target_lang = non_empty(body.target_lang).unwrap_or_else(|| DEFAULT_TARGET_LANG.to_string());

    let organization = organization_id(&headers);
    let required = credits_for_translation(text.chars().count());
    if let Some(org) = &organization {
        state
            .credits
            .deduct(org, required, CreditOperation::Translation)?;
    }

    let result = state
        .documents
        .translate_text(&text, &source_lang, Some(&target_lang))
        .await
        .map_err(|e| {
            refund(&state, organization.as_deref(), required);
            e
        })?;

    Ok(ok(
        "Text translated successfully",
        TranslateResponse {
            translation: result.translated_text,
            source_lang,
            target_lang,
        },
    ))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExtractAndTranslateResponse {
    translation: String,
    meta: ExtractionResult,
    file_name: Option<String>,
    mime_type: Option<String>,
    source_lang: String,
    target_lang: String,
    force_ocr: bool,
}

async fn extract_and_translate(
    State(state): State<AppState>,
    Query(query): Query<ForceOcrQuery>,
    headers: HeaderMap,
    request: Request,
) -> PipelineResult<Json<Envelope<ExtractAndTranslateResponse>>> {
    let upload = Upload::from_request(request).await?;
    let force_ocr = query.resolve(upload.force_ocr);
    let data = upload.require_data()?;
    let source_lang = non_empty(upload.source_lang.clone())
        .ok_or_else(|| PipelineError::Validation("'sourceLang' is required".to_string()))?;
    let target_lang =
        non_empty(upload.target_lang.clone()).unwrap_or_else(|| DEFAULT_TARGET_LANG.to_string());

    // The full charge depends on the extracted length. Reserve the minimum up
    // front and settle the rest, capped at the balance, once the work is done.
    let organization = organization_id(&headers);
    let reserved = credits_for_translation(0);
    if let Some(org) = &organization {
        state
            .credits
            .deduct(org, reserved, CreditOperation::ExtractAndTranslate)?;
    }

    let result = state
        .documents
        .extract_and_translate(upload.document(data), &source_lang, Some(&target_lang), force_ocr)
        .await
        .map_err(|e| {
            refund(&state, organization.as_deref(), reserved);
            e
        })?;

    if let Some(org) = &organization {
        let remainder =
            credits_for_translation(result.extraction.text.chars().count()).saturating_sub(reserved);
        if remainder > 0 {
            let settled =
                state
                    .credits
                    .deduct_up_to(org, remainder, CreditOperation::ExtractAndTranslate);
            if let Err(e) = settled {
                warn!("Failed to settle credits for {}: {}", org, e);
            }
        }
    }

    Ok(ok(
        "Document translated successfully",
        ExtractAndTranslateResponse {
            translation: result.translated_text,
            meta: result.extraction,
            file_name: upload.file_name,
            mime_type: upload.mime_type,
            source_lang,
            target_lang,
            force_ocr,
        },
    ))
}

// ============================================================================
// Upload parsing
// ============================================================================

/// File plus form fields, from either a multipart or a JSON body.
#[derive(Debug, Default)]
struct Upload {
    data: Option<Vec<u8>>,
    file_name: Option<String>,
    mime_type: Option<String>,
    force_ocr: bool,
    source_lang: Option<String>,
    target_lang: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonUpload {
    content_base64: Option<String>,
    file_name: Option<String>,
    mime_type: Option<String>,
    #[serde(default)]
    force_ocr: serde_json::Value,
    source_lang: Option<String>,
    target_lang: Option<String>,
}

impl Upload {
    async fn from_request(request: Request) -> PipelineResult<Self> {
        let content_type = request
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(request, &())
                .await
                .map_err(|e| PipelineError::Validation(format!("Invalid multipart body: {}", e)))?;
            Self::from_multipart(multipart).await
        } else if content_type.starts_with("application/json") {
            let Json(body) = Json::<JsonUpload>::from_request(request, &())
                .await
                .map_err(|e| PipelineError::Validation(format!("Invalid JSON body: {}", e)))?;
            Self::from_json(body)
        } else {
            Ok(Self::default())
        }
    }

    async fn from_multipart(mut multipart: Multipart) -> PipelineResult<Self> {
        let mut upload = Self::default();
        let field_error = |e: axum::extract::multipart::MultipartError| {
            PipelineError::Validation(format!("Multipart error: {}", e))
        };

        while let Some(field) = multipart.next_field().await.map_err(field_error)? {
            let name = field.name().unwrap_or("").to_string();
            match name.as_str() {
                "file" => {
                    upload.file_name = field.file_name().map(str::to_string);
                    upload.mime_type = field
                        .content_type()
                        .map(str::to_string)
                        .filter(|m| !m.is_empty());
                    upload.data = Some(field.bytes().await.map_err(field_error)?.to_vec());
                }
                "forceOcr" => upload.force_ocr = parse_flag(&field.text().await.map_err(field_error)?),
                "sourceLang" => upload.source_lang = Some(field.text().await.map_err(field_error)?),
                "targetLang" => upload.target_lang = Some(field.text().await.map_err(field_error)?),
                _ => {}
            }
        }

        Ok(upload)
    }

    fn from_json(body: JsonUpload) -> PipelineResult<Self> {
        let content = body.content_base64.ok_or_else(|| {
            PipelineError::Validation(
                "Missing 'contentBase64' in JSON body when not using multipart upload".to_string(),
            )
        })?;
        let data = BASE64
            .decode(content.trim())
            .map_err(|_| PipelineError::Validation("Invalid base64 content".to_string()))?;

        Ok(Self {
            data: Some(data),
            file_name: body.file_name,
            mime_type: body.mime_type,
            force_ocr: is_truthy(&body.force_ocr),
            source_lang: body.source_lang,
            target_lang: body.target_lang,
        })
    }

    fn require_data(&self) -> PipelineResult<&[u8]> {
        self.data.as_deref().ok_or_else(|| {
            PipelineError::Validation(
                "No file provided. Use 'file' field in multipart/form-data or JSON with 'contentBase64'."
                    .to_string(),
            )
        })
    }

    fn document<'a>(&'a self, data: &'a [u8]) -> RawDocument<'a> {
        RawDocument {
            data,
            file_name: self.file_name.as_deref(),
            mime_type: self.mime_type.as_deref(),
        }
    }
}

fn is_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::String(s) => parse_flag(s),
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        _ => false,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn refund(state: &AppState, organization: Option<&str>, credits: u64) {
    if let Some(org) = organization {
        if let Err(e) = state.credits.refund(org, credits) {
            warn!("Failed to refund {} credits to {}: {}", credits, org, e);
        }
    }
}

fn organization_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(ORGANIZATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
