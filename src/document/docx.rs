//! Raw text extraction from OOXML word-processing documents.
//!
//! A `.docx` file is a zip archive; the body lives in `word/document.xml`.
//! Text runs (`w:t`) are concatenated, `w:tab` becomes a tab, `w:br`/`w:cr`
//! a newline, and every paragraph (`w:p`) ends with a newline.

use crate::error::{PipelineError, PipelineResult};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read};
use zip::ZipArchive;

const DOCUMENT_PART: &str = "word/document.xml";

#[async_trait::async_trait]
pub trait DocxParser: Send + Sync {
    /// Fails with `PipelineError::Parse` if `data` is not a readable DOCX.
    async fn extract_raw_text(&self, data: &[u8]) -> PipelineResult<String>;
}

#[derive(Debug, Clone, Default)]
pub struct OoxmlParser;

#[async_trait::async_trait]
impl DocxParser for OoxmlParser {
    async fn extract_raw_text(&self, data: &[u8]) -> PipelineResult<String> {
        let data = data.to_vec();
        tokio::task::spawn_blocking(move || extract_document_text(&data))
            .await
            .map_err(|e| PipelineError::Parse(format!("DOCX parser task failed: {}", e)))?
    }
}

fn extract_document_text(data: &[u8]) -> PipelineResult<String> {
    let mut archive = ZipArchive::new(Cursor::new(data))
        .map_err(|e| PipelineError::Parse(format!("Not a DOCX archive: {}", e)))?;

    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_PART)
        .map_err(|e| PipelineError::Parse(format!("DOCX has no {}: {}", DOCUMENT_PART, e)))?
        .read_to_string(&mut xml)
        .map_err(|e| PipelineError::Parse(format!("Failed to read {}: {}", DOCUMENT_PART, e)))?;

    document_xml_to_text(&xml)
}

fn document_xml_to_text(xml: &str) -> PipelineResult<String> {
    let mut reader = Reader::from_str(xml);
    let mut text = String::new();
    let mut in_text_run = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if e.name().as_ref() == b"w:t" {
                    in_text_run = true;
                }
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_text_run = false,
                b"w:p" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:tab" => text.push('\t'),
                b"w:br" | b"w:cr" => text.push('\n'),
                b"w:p" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text_run => {
                let run = t.unescape().map_err(|e| {
                    PipelineError::Parse(format!("Invalid text in {}: {}", DOCUMENT_PART, e))
                })?;
                text.push_str(&run);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(PipelineError::Parse(format!(
                    "Malformed {} at position {}: {}",
                    DOCUMENT_PART,
                    reader.buffer_position(),
                    e
                )))
            }
        }
    }

    Ok(text)
}
