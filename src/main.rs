//! Transcribe It - document text extraction, OCR and translation server.

mod config;
mod credits;
mod document;
mod error;
mod genai;
mod ocr;
mod routes;
mod translate;

#[cfg(test)]
mod test_support;

use config::AppConfig;
use credits::InMemoryCreditLedger;
use document::docx::OoxmlParser;
use document::pdf::LopdfParser;
use document::{Backends, DocumentService, PipelineOptions};
use genai::GeminiClient;
use ocr::tesseract::TesseractEngine;
use routes::AppState;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use translate::ResponseMode;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "transcribe_it=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let llm = match &config.genai {
        Some(genai) => {
            info!("Google GenAI client initialized (model {})", genai.model);
            let client = GeminiClient::new(reqwest::Client::new(), genai.clone());
            Some(Arc::new(client) as Arc<dyn genai::GenerativeModel>)
        }
        None => {
            warn!("No GenAI API key configured; LLM OCR and translation are disabled");
            None
        }
    };

    let tesseract = TesseractEngine::detect(&config.ocr.command).await;

    let backends = Backends {
        pdf: Some(Arc::new(LopdfParser)),
        docx: Some(Arc::new(OoxmlParser)),
        ocr: tesseract.map(|engine| Arc::new(engine) as Arc<dyn ocr::OcrEngine>),
        llm,
    };

    let options = PipelineOptions {
        min_pdf_text_length: config.min_pdf_text_length,
        guess_unknown_formats: config.guess_unknown_formats,
        ocr_language: config.ocr.language.clone(),
        translation_mode: if config.translation_json {
            ResponseMode::Json
        } else {
            ResponseMode::Plain
        },
    };

    info!("Seeded credits for {} organizations", config.org_credits.len());
    let state = AppState {
        documents: Arc::new(DocumentService::new(backends, options)),
        credits: Arc::new(InMemoryCreditLedger::new(config.org_credits.clone())),
    };

    let app = routes::router(state, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!("Server listening on http://{}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
