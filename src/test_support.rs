//! In-crate fakes for the pipeline's backend traits, with call counters.

use crate::document::docx::DocxParser;
use crate::document::pdf::{PdfParser, PdfText};
use crate::error::{PipelineError, PipelineResult};
use crate::genai::{GenerateRequest, GenerateResponse, GenerativeModel};
use crate::ocr::OcrEngine;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Replays scripted replies in order and records every request.
/// `Err(msg)` becomes a `PipelineError::Transport`.
pub struct ScriptedModel {
    responses: Mutex<VecDeque<Result<GenerateResponse, String>>>,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Result<&str, &str>>) -> Arc<Self> {
        Self::with_responses(
            replies
                .into_iter()
                .map(|r| r.map(GenerateResponse::from_text).map_err(str::to_string))
                .collect(),
        )
    }

    pub fn with_responses(responses: Vec<Result<GenerateResponse, String>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl GenerativeModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: &GenerateRequest) -> PipelineResult<GenerateResponse> {
        self.requests.lock().unwrap().push(request.clone());
        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(msg)) => Err(PipelineError::Transport(msg)),
            None => Err(PipelineError::Transport("no scripted response left".into())),
        }
    }
}

pub struct FakePdfParser {
    result: Result<(String, u32), String>,
    calls: AtomicUsize,
}

impl FakePdfParser {
    pub fn text(text: &str, pages: u32) -> Arc<Self> {
        Arc::new(Self {
            result: Ok((text.to_string(), pages)),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(msg: &str) -> Arc<Self> {
        Arc::new(Self {
            result: Err(msg.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl PdfParser for FakePdfParser {
    async fn parse(&self, _data: &[u8]) -> PipelineResult<PdfText> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.result {
            Ok((text, pages)) => Ok(PdfText {
                text: text.clone(),
                page_count: *pages,
            }),
            Err(msg) => Err(PipelineError::Parse(msg.clone())),
        }
    }
}

pub struct FakeDocxParser {
    result: Result<String, String>,
    calls: AtomicUsize,
}

impl FakeDocxParser {
    pub fn text(text: &str) -> Arc<Self> {
        Arc::new(Self {
            result: Ok(text.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(msg: &str) -> Arc<Self> {
        Arc::new(Self {
            result: Err(msg.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl DocxParser for FakeDocxParser {
    async fn extract_raw_text(&self, _data: &[u8]) -> PipelineResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone().map_err(PipelineError::Parse)
    }
}

pub struct FakeOcrEngine {
    text: String,
    calls: AtomicUsize,
    languages: Mutex<Vec<String>>,
}

impl FakeOcrEngine {
    pub fn new(text: &str) -> Arc<Self> {
        Arc::new(Self {
            text: text.to_string(),
            calls: AtomicUsize::new(0),
            languages: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn languages(&self) -> Vec<String> {
        self.languages.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl OcrEngine for FakeOcrEngine {
    fn name(&self) -> &str {
        "fake-ocr"
    }

    async fn recognize(&self, _image: &[u8], language: &str) -> PipelineResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.languages.lock().unwrap().push(language.to_string());
        Ok(self.text.clone())
    }
}
