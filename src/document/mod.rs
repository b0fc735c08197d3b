//! Document extraction and translation pipeline.
//!
//! Given raw bytes plus an optional MIME type and file name, the pipeline picks
//! an extractor (PDF text layer, DOCX, image OCR), falls back to LLM OCR where
//! the native path is insufficient, and optionally translates the result.
//! Which backends exist is decided once, when [`Backends`] is built.

pub mod docx;
pub mod format;
pub mod pdf;

use crate::error::{PipelineError, PipelineResult};
use crate::genai::GenerativeModel;
use crate::ocr::llm::{LlmOcr, IMAGE_MIME};
use crate::ocr::OcrEngine;
use crate::translate::{ResponseMode, TranslationResult, Translator};
use docx::DocxParser;
use format::{DocumentKind, FormatHint, GUESS_ORDER, PDF_MIME};
use pdf::PdfParser;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const LLM_PDF_FALLBACK_WARNING: &str = "Used LLM OCR fallback for PDF (Gemini)";
pub const LLM_PDF_AFTER_PARSE_FAILURE_WARNING: &str =
    "PDF text layer could not be parsed; used LLM OCR fallback for PDF (Gemini)";
pub const LLM_OCR_EMPTY_WARNING: &str =
    "LLM OCR fallback returned empty text. Document may be purely images or unreadable.";
pub const NO_TEXT_LAYER_WARNING: &str = "No extractable text found. If this is a scanned PDF, OCR is required. Configure GOOGLE_API_KEY to enable LLM OCR.";
pub const FORCE_OCR_UNAVAILABLE_WARNING: &str =
    "OCR was requested but no LLM OCR backend is configured. Configure GOOGLE_API_KEY to enable LLM OCR.";
pub const EMPTY_DOCX_WARNING: &str = "DOCX document contains no text.";
pub const EMPTY_IMAGE_WARNING: &str = "No text was recognized in the image.";

/// Caller-provided document. Borrowed for the duration of one call only.
#[derive(Debug, Clone, Copy)]
pub struct RawDocument<'a> {
    pub data: &'a [u8],
    pub file_name: Option<&'a str>,
    pub mime_type: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    #[serde(rename = "type")]
    pub kind: DocumentKind,
    /// Best-effort text. Empty only together with at least one warning.
    pub text: String,
    #[serde(rename = "pages", skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractAndTranslateResult {
    pub translated_text: String,
    pub extraction: ExtractionResult,
}

/// Optional backends; `None` means the capability is absent.
#[derive(Clone, Default)]
pub struct Backends {
    pub pdf: Option<Arc<dyn PdfParser>>,
    pub docx: Option<Arc<dyn DocxParser>>,
    pub ocr: Option<Arc<dyn OcrEngine>>,
    pub llm: Option<Arc<dyn GenerativeModel>>,
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Native PDF text shorter than this (in chars, after trim) triggers OCR.
    pub min_pdf_text_length: usize,
    /// Try PDF, then DOCX, then image when the format is unknown.
    pub guess_unknown_formats: bool,
    /// Language passed to the conventional OCR engine.
    pub ocr_language: String,
    pub translation_mode: ResponseMode,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            min_pdf_text_length: crate::config::DEFAULT_MIN_PDF_TEXT_LENGTH,
            guess_unknown_formats: true,
            ocr_language: "eng".to_string(),
            translation_mode: ResponseMode::Plain,
        }
    }
}

/// Stateless between calls; safe to share behind an `Arc`.
pub struct DocumentService {
    pdf: Option<Arc<dyn PdfParser>>,
    docx: Option<Arc<dyn DocxParser>>,
    ocr: Option<Arc<dyn OcrEngine>>,
    llm_ocr: Option<LlmOcr>,
    translator: Option<Translator>,
    options: PipelineOptions,
}

impl DocumentService {
    pub fn new(backends: Backends, options: PipelineOptions) -> Self {
        let llm_ocr = backends.llm.clone().map(LlmOcr::new);
        let translator = backends
            .llm
            .map(|model| Translator::new(model, options.translation_mode));

        Self {
            pdf: backends.pdf,
            docx: backends.docx,
            ocr: backends.ocr,
            llm_ocr,
            translator,
            options,
        }
    }

    /// Extract text from `doc`. `force_ocr` bypasses the PDF text-layer check.
    pub async fn extract_text(
        &self,
        doc: RawDocument<'_>,
        force_ocr: bool,
    ) -> PipelineResult<ExtractionResult> {
        if doc.data.is_empty() {
            return Err(PipelineError::Validation("No file provided".to_string()));
        }

        let hint = FormatHint::new(doc.mime_type, doc.file_name);
        match hint.detect() {
            Some(kind) => {
                info!(
                    "Extracting {} bytes as {} (mime={:?}, file={:?}, force_ocr={})",
                    doc.data.len(),
                    kind,
                    doc.mime_type,
                    doc.file_name,
                    force_ocr
                );
                self.extract_as(kind, doc.data, force_ocr).await
            }
            None if self.options.guess_unknown_formats => {
                info!(
                    "Unrecognized format (mime={:?}, file={:?}); guessing",
                    doc.mime_type, doc.file_name
                );
                self.extract_guessing(doc.data, force_ocr).await
            }
            None => Err(PipelineError::UnsupportedFormat(format!(
                "mime type {:?}, file name {:?}",
                doc.mime_type.unwrap_or(""),
                doc.file_name.unwrap_or("")
            ))),
        }
    }

    /// Translate already-extracted text.
    pub async fn translate_text(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: Option<&str>,
    ) -> PipelineResult<TranslationResult> {
        self.translator()?
            .translate(text, source_lang, target_lang)
            .await
    }

    /// Extract, then translate the extracted text as-is.
    ///
    /// Input validation and the translator configuration are checked before any
    /// backend is touched, so a request that cannot finish costs nothing.
    pub async fn extract_and_translate(
        &self,
        doc: RawDocument<'_>,
        source_lang: &str,
        target_lang: Option<&str>,
        force_ocr: bool,
    ) -> PipelineResult<ExtractAndTranslateResult> {
        if doc.data.is_empty() {
            return Err(PipelineError::Validation("No file provided".to_string()));
        }
        if source_lang.trim().is_empty() {
            return Err(PipelineError::Validation("'sourceLang' is required".to_string()));
        }
        let translator = self.translator()?;

        let extraction = self.extract_text(doc, force_ocr).await?;
        let translation = translator
            .translate(&extraction.text, source_lang, target_lang)
            .await?;

        Ok(ExtractAndTranslateResult {
            translated_text: translation.translated_text,
            extraction,
        })
    }

    fn translator(&self) -> PipelineResult<&Translator> {
        self.translator.as_ref().ok_or_else(|| {
            PipelineError::Configuration(
                "Google GenAI API key not configured. Set GOOGLE_API_KEY, GENAI_API_KEY or API_KEY."
                    .to_string(),
            )
        })
    }

    async fn extract_as(
        &self,
        kind: DocumentKind,
        data: &[u8],
        force_ocr: bool,
    ) -> PipelineResult<ExtractionResult> {
        match kind {
            DocumentKind::Pdf => self.extract_pdf(data, force_ocr).await,
            DocumentKind::Docx => self.extract_docx(data).await,
            DocumentKind::Image => self.extract_image(data).await,
        }
    }

    async fn extract_guessing(
        &self,
        data: &[u8],
        force_ocr: bool,
    ) -> PipelineResult<ExtractionResult> {
        let mut last_err = None;

        for kind in GUESS_ORDER {
            match self.extract_as(kind, data, force_ocr).await {
                Ok(mut result) => {
                    result.warnings.insert(
                        0,
                        format!(
                            "Format not recognized from MIME type or file name; extracted as {}.",
                            kind
                        ),
                    );
                    return Ok(result);
                }
                Err(e) => {
                    debug!("Guessed format {} failed: {}", kind, e);
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            PipelineError::UnsupportedFormat("no extractor accepted the document".to_string())
        }))
    }

    async fn extract_pdf(&self, data: &[u8], force_ocr: bool) -> PipelineResult<ExtractionResult> {
        let parsed = match &self.pdf {
            Some(parser) => parser.parse(data).await,
            None => Err(PipelineError::Configuration(
                "PDF parser not available".to_string(),
            )),
        };

        let parsed = match parsed {
            Ok(parsed) => parsed,
            Err(err) => return self.ocr_unparseable_pdf(data, err).await,
        };

        let mut text = parsed.text.trim().to_string();
        let mut warnings = Vec::new();
        let native_len = text.chars().count();

        if force_ocr || native_len < self.options.min_pdf_text_length {
            debug!(
                "PDF text layer insufficient ({} chars, force_ocr={})",
                native_len, force_ocr
            );
            match &self.llm_ocr {
                Some(ocr) => match ocr.extract(data, PDF_MIME).await {
                    Ok(ocr_text) if !ocr_text.is_empty() => {
                        info!("LLM OCR replaced PDF text layer ({} chars)", ocr_text.chars().count());
                        text = ocr_text;
                        warnings.push(LLM_PDF_FALLBACK_WARNING.to_string());
                    }
                    Ok(_) => warnings.push(LLM_OCR_EMPTY_WARNING.to_string()),
                    Err(e) => {
                        warn!("LLM OCR fallback for PDF failed: {}", e);
                        warnings.push(format!("LLM OCR fallback for PDF failed: {}", e));
                    }
                },
                None if native_len >= self.options.min_pdf_text_length => {
                    warnings.push(FORCE_OCR_UNAVAILABLE_WARNING.to_string())
                }
                None => warnings.push(NO_TEXT_LAYER_WARNING.to_string()),
            }
        }

        Ok(ExtractionResult {
            kind: DocumentKind::Pdf,
            text,
            page_count: Some(parsed.page_count),
            warnings,
        })
    }

    /// The parser rejected the file: OCR the whole document, or give up.
    async fn ocr_unparseable_pdf(
        &self,
        data: &[u8],
        err: PipelineError,
    ) -> PipelineResult<ExtractionResult> {
        let Some(ocr) = &self.llm_ocr else {
            return Err(err);
        };

        warn!("PDF parsing failed ({}); falling back to LLM OCR", err);
        let text = ocr.extract(data, PDF_MIME).await?;

        let mut warnings = vec![LLM_PDF_AFTER_PARSE_FAILURE_WARNING.to_string()];
        if text.is_empty() {
            warnings.push(LLM_OCR_EMPTY_WARNING.to_string());
        }

        Ok(ExtractionResult {
            kind: DocumentKind::Pdf,
            text,
            page_count: None,
            warnings,
        })
    }

    async fn extract_docx(&self, data: &[u8]) -> PipelineResult<ExtractionResult> {
        let parser = self.docx.as_ref().ok_or_else(|| {
            PipelineError::Configuration("DOCX parser not available".to_string())
        })?;

        let text = parser.extract_raw_text(data).await?.trim().to_string();
        let warnings = if text.is_empty() {
            vec![EMPTY_DOCX_WARNING.to_string()]
        } else {
            Vec::new()
        };

        Ok(ExtractionResult {
            kind: DocumentKind::Docx,
            text,
            page_count: None,
            warnings,
        })
    }

    async fn extract_image(&self, data: &[u8]) -> PipelineResult<ExtractionResult> {
        let mut warnings = Vec::new();

        if let Some(ocr) = &self.llm_ocr {
            match ocr.extract(data, IMAGE_MIME).await {
                Ok(text) => return Ok(image_result(text, warnings)),
                Err(e) if self.ocr.is_some() => {
                    warn!("LLM OCR for image failed ({}); trying conventional OCR", e);
                    warnings.push(format!("LLM OCR failed ({}); used conventional OCR.", e));
                }
                Err(e) => return Err(e),
            }
        }

        if let Some(engine) = &self.ocr {
            debug!("Running {} OCR", engine.name());
            let text = engine
                .recognize(data, &self.options.ocr_language)
                .await?
                .trim()
                .to_string();
            return Ok(image_result(text, warnings));
        }

        Err(PipelineError::Configuration(
            "OCR engine not available. Install 'tesseract' or configure GOOGLE_API_KEY to enable LLM OCR."
                .to_string(),
        ))
    }
}

fn image_result(text: String, mut warnings: Vec<String>) -> ExtractionResult {
    if text.is_empty() {
        warnings.push(EMPTY_IMAGE_WARNING.to_string());
    }
    ExtractionResult {
        kind: DocumentKind::Image,
        text,
        page_count: None,
        warnings,
    }
}
