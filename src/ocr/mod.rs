//! OCR backends.
//!
//! Two kinds of OCR feed the document pipeline: a conventional engine behind
//! the [`OcrEngine`] trait (Tesseract) and the LLM OCR client in [`llm`],
//! which reads text out of images and PDFs through a generative model.

pub mod llm;
pub mod tesseract;

use crate::error::PipelineResult;

/// Conventional OCR engine: image bytes in, recognized text out.
#[async_trait::async_trait]
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &str;
    async fn recognize(&self, image: &[u8], language: &str) -> PipelineResult<String>;
}
