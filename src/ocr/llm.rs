//! LLM OCR: extract text from a file by sending it inline to a generative model.

use crate::error::{PipelineError, PipelineResult};
use crate::genai::{GenerateRequest, GenerativeModel};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::sync::Arc;
use tracing::{debug, warn};

pub use crate::document::format::PDF_MIME;
/// Images are always declared as JPEG; the endpoint is subtype-tolerant.
pub const IMAGE_MIME: &str = "image/jpeg";

const EXTRACT_INSTRUCTION: &str =
    "Extract all text from this document. If no text is present, return an empty response.";
const IMAGE_WRAPPED_PDF_INSTRUCTION: &str =
    "This file may be an image-wrapped PDF. Perform OCR and extract any text.";

#[derive(Clone)]
pub struct LlmOcr {
    model: Arc<dyn GenerativeModel>,
}

impl LlmOcr {
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self { model }
    }

    /// Extract text from `data` declared as `mime_type`, trimmed.
    ///
    /// A failed `application/pdf` request is retried exactly once with the same
    /// bytes declared as `image/jpeg`; if that fails too, the error leads with
    /// the backend's reason for rejecting the PDF. An unexpected reply shape
    /// yields `""`.
    pub async fn extract(&self, data: &[u8], mime_type: &str) -> PipelineResult<String> {
        let encoded = BASE64.encode(data);
        debug!(
            "LLM OCR via {}: {} bytes as {}",
            self.model.name(),
            data.len(),
            mime_type
        );

        let request = GenerateRequest::inline(mime_type, encoded.as_str(), EXTRACT_INSTRUCTION);
        let response = match self.model.generate(&request).await {
            Ok(response) => response,
            Err(err) if mime_type == PDF_MIME => {
                warn!("LLM OCR rejected PDF ({}); retrying as {}", err, IMAGE_MIME);
                let retry =
                    GenerateRequest::inline(IMAGE_MIME, encoded, IMAGE_WRAPPED_PDF_INSTRUCTION);
                self.model.generate(&retry).await.map_err(|retry_err| {
                    PipelineError::Transport(format!(
                        "{} (retry as {} also failed: {})",
                        err, IMAGE_MIME, retry_err
                    ))
                })?
            }
            Err(err) => return Err(err),
        };

        Ok(response.text().trim().to_string())
    }
}
