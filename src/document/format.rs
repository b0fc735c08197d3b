//! Format detection: declared MIME type and file extension to extractor kind.

use serde::Serialize;
use std::fmt;

pub const PDF_MIME: &str = "application/pdf";
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

const IMAGE_MIMES: [&str; 6] = [
    "image/png",
    "image/jpeg",
    "image/jpg",
    "image/webp",
    "image/bmp",
    "image/tiff",
];

const IMAGE_EXTENSIONS: [&str; 7] = [".png", ".jpeg", ".jpg", ".webp", ".bmp", ".tiff", ".tif"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Docx,
    Image,
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Image => "image",
        })
    }
}

/// Order in which extractors are attempted when nothing identifies the format.
///
/// Kept for clients that omit the MIME type entirely. The order is historical,
/// not semantic: a non-PDF file reaches the DOCX and image paths only after the
/// PDF path has failed.
pub const GUESS_ORDER: [DocumentKind; 3] = [DocumentKind::Pdf, DocumentKind::Docx, DocumentKind::Image];

/// Normalized inputs to format detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatHint {
    /// Lower-cased MIME type without parameters, `""` if absent.
    pub mime: String,
    /// Lower-cased extension including the dot, `""` if absent.
    pub extension: String,
}

impl FormatHint {
    pub fn new(mime_type: Option<&str>, file_name: Option<&str>) -> Self {
        Self {
            mime: normalize_mime(mime_type),
            extension: extension(file_name),
        }
    }

    /// First matching rule wins; `None` means the format is unknown.
    pub fn detect(&self) -> Option<DocumentKind> {
        RULES
            .iter()
            .find(|(_, matches)| matches(self))
            .map(|(kind, _)| *kind)
    }
}

type Rule = (DocumentKind, fn(&FormatHint) -> bool);

const RULES: [Rule; 3] = [
    (DocumentKind::Pdf, is_pdf),
    (DocumentKind::Docx, is_docx),
    (DocumentKind::Image, is_image),
];

fn is_pdf(hint: &FormatHint) -> bool {
    hint.mime == PDF_MIME || hint.extension == ".pdf"
}

fn is_docx(hint: &FormatHint) -> bool {
    hint.mime == DOCX_MIME || hint.extension == ".docx"
}

fn is_image(hint: &FormatHint) -> bool {
    IMAGE_MIMES.contains(&hint.mime.as_str()) || IMAGE_EXTENSIONS.contains(&hint.extension.as_str())
}

fn normalize_mime(mime_type: Option<&str>) -> String {
    mime_type
        .unwrap_or("")
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

fn extension(file_name: Option<&str>) -> String {
    file_name
        .and_then(|name| name.rfind('.').map(|idx| name[idx..].to_ascii_lowercase()))
        .unwrap_or_default()
}
