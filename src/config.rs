//! Runtime configuration.
//!
//! Everything is resolved once at startup from the process environment (after
//! `.env` is loaded) and passed down explicitly. Nothing below reads the
//! environment per request.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::net::SocketAddr;

/// API key variables, checked in order; the first non-empty one wins.
pub const API_KEY_VARS: [&str; 3] = ["GOOGLE_API_KEY", "GENAI_API_KEY", "API_KEY"];

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MIN_PDF_TEXT_LENGTH: usize = 50;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Connection settings for the generative-language endpoint.
#[derive(Debug, Clone)]
pub struct GenAiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

/// Conventional OCR engine settings.
#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub command: String,
    pub language: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `None` when no API key variable is set; LLM OCR and translation are disabled.
    pub genai: Option<GenAiConfig>,
    pub ocr: OcrConfig,
    pub translation_json: bool,
    pub guess_unknown_formats: bool,
    pub min_pdf_text_length: usize,
    pub bind_addr: SocketAddr,
    pub max_upload_bytes: usize,
    pub org_credits: HashMap<String, u64>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = API_KEY_VARS.iter().find_map(|name| get(name));
        let genai = api_key.map(|api_key| GenAiConfig {
            api_key,
            model: get("GENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: get("GENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        });

        let ocr = OcrConfig {
            command: get("TESSERACT_CMD").unwrap_or_else(|| "tesseract".to_string()),
            language: get("OCR_LANGUAGE").unwrap_or_else(|| "eng".to_string()),
        };

        let min_pdf_text_length = match get("MIN_PDF_TEXT_LENGTH") {
            Some(v) => v
                .parse()
                .with_context(|| format!("MIN_PDF_TEXT_LENGTH is not a number: {}", v))?,
            None => DEFAULT_MIN_PDF_TEXT_LENGTH,
        };

        let max_upload_bytes = match get("MAX_UPLOAD_BYTES") {
            Some(v) => v
                .parse()
                .with_context(|| format!("MAX_UPLOAD_BYTES is not a number: {}", v))?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let bind_addr = get("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .context("BIND_ADDR is not a valid socket address")?;

        let org_credits = match get("ORG_CREDITS") {
            Some(v) => parse_org_credits(&v)?,
            None => HashMap::new(),
        };

        Ok(Self {
            genai,
            ocr,
            translation_json: get("GENAI_TRANSLATION_JSON")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
            guess_unknown_formats: get("GUESS_UNKNOWN_FORMATS")
                .map(|v| parse_flag(&v))
                .unwrap_or(true),
            min_pdf_text_length,
            bind_addr,
            max_upload_bytes,
            org_credits,
        })
    }
}

/// Truthy values accepted for boolean settings and the `forceOcr` flag.
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Parse `org_a=100,org_b=25`.
fn parse_org_credits(value: &str) -> Result<HashMap<String, u64>> {
    let mut credits = HashMap::new();
    for entry in value.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (org, amount) = entry
            .split_once('=')
            .with_context(|| format!("ORG_CREDITS entry must be org=amount: {}", entry))?;
        let amount: u64 = amount
            .trim()
            .parse()
            .with_context(|| format!("ORG_CREDITS amount is not a number: {}", entry))?;
        credits.insert(org.trim().to_string(), amount);
    }
    Ok(credits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> Result<AppConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert!(config.genai.is_none());
        assert_eq!(config.ocr.language, "eng");
        assert_eq!(config.min_pdf_text_length, 50);
        assert!(config.guess_unknown_formats);
        assert!(!config.translation_json);
        assert!(config.org_credits.is_empty());
    }

    #[test]
    fn test_api_key_order() {
        let config = config_from(&[("API_KEY", "third"), ("GENAI_API_KEY", "second")]).unwrap();
        let genai = config.genai.unwrap();
        assert_eq!(genai.api_key, "second");
        assert_eq!(genai.model, DEFAULT_MODEL);

        let config = config_from(&[("GOOGLE_API_KEY", ""), ("API_KEY", "third")]).unwrap();
        assert_eq!(config.genai.unwrap().api_key, "third");
    }

    #[test]
    fn test_model_and_flags() {
        let config = config_from(&[
            ("GOOGLE_API_KEY", "k"),
            ("GENAI_MODEL", "gemini-2.0-flash"),
            ("GENAI_BASE_URL", "http://localhost:1234/"),
            ("GUESS_UNKNOWN_FORMATS", "off"),
            ("GENAI_TRANSLATION_JSON", "Yes"),
        ])
        .unwrap();
        let genai = config.genai.unwrap();
        assert_eq!(genai.model, "gemini-2.0-flash");
        assert_eq!(genai.base_url, "http://localhost:1234");
        assert!(!config.guess_unknown_formats);
        assert!(config.translation_json);
    }

    #[test]
    fn test_org_credits() {
        let config = config_from(&[("ORG_CREDITS", "acme=100, globex = 5")]).unwrap();
        assert_eq!(config.org_credits.get("acme"), Some(&100));
        assert_eq!(config.org_credits.get("globex"), Some(&5));

        assert!(config_from(&[("ORG_CREDITS", "acme")]).is_err());
        assert!(config_from(&[("MIN_PDF_TEXT_LENGTH", "many")]).is_err());
    }

    #[test]
    fn test_parse_flag() {
        for v in ["1", "true", "YES", " on "] {
            assert!(parse_flag(v), "{v}");
        }
        for v in ["0", "false", "", "nope"] {
            assert!(!parse_flag(v), "{v}");
        }
    }
}
