//! Native PDF text-layer extraction.

use crate::error::{PipelineError, PipelineResult};
use lopdf::Document;
use tracing::debug;

/// Text layer and page count as reported by the parser.
#[derive(Debug, Clone)]
pub struct PdfText {
    pub text: String,
    pub page_count: u32,
}

#[async_trait::async_trait]
pub trait PdfParser: Send + Sync {
    /// Fails with `PipelineError::Parse` on malformed input.
    async fn parse(&self, data: &[u8]) -> PipelineResult<PdfText>;
}

/// [`PdfParser`] backed by lopdf. Parsing runs on the blocking pool.
#[derive(Debug, Clone, Default)]
pub struct LopdfParser;

#[async_trait::async_trait]
impl PdfParser for LopdfParser {
    async fn parse(&self, data: &[u8]) -> PipelineResult<PdfText> {
        let data = data.to_vec();
        tokio::task::spawn_blocking(move || extract_text_layer(&data))
            .await
            .map_err(|e| PipelineError::Parse(format!("PDF parser task failed: {}", e)))?
    }
}

fn extract_text_layer(data: &[u8]) -> PipelineResult<PdfText> {
    let doc = Document::load_mem(data)
        .map_err(|e| PipelineError::Parse(format!("Failed to load PDF: {}", e)))?;

    let pages = doc.get_pages();
    let mut text = String::new();

    for page_num in pages.keys() {
        match doc.extract_text(&[*page_num]) {
            Ok(content) => {
                text.push_str(&content);
                text.push('\n');
            }
            Err(e) => debug!("No text layer on page {}: {}", page_num, e),
        }
    }

    Ok(PdfText {
        text,
        page_count: pages.len() as u32,
    })
}
