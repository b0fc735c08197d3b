//! Tesseract OCR engine, driven through its command-line interface.

use super::OcrEngine;
use crate::error::{PipelineError, PipelineResult};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

pub struct TesseractEngine {
    command: String,
}

impl TesseractEngine {
    /// Probe `command --version` once. Returns `None` when the binary cannot run.
    pub async fn detect(command: &str) -> Option<Self> {
        match Command::new(command).arg("--version").output().await {
            Ok(output) if output.status.success() => {
                let version = String::from_utf8_lossy(&output.stdout);
                info!(
                    "Tesseract available: {}",
                    version.lines().next().unwrap_or("unknown version")
                );
                Some(Self {
                    command: command.to_string(),
                })
            }
            Ok(output) => {
                warn!(
                    "'{} --version' exited with {}; conventional OCR disabled",
                    command, output.status
                );
                None
            }
            Err(e) => {
                info!("Tesseract not available ({}): {}", command, e);
                None
            }
        }
    }
}

#[async_trait::async_trait]
impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    async fn recognize(&self, image: &[u8], language: &str) -> PipelineResult<String> {
        debug!("Running tesseract on {} bytes (lang={})", image.len(), language);

        // `stdin stdout` keeps everything in pipes, no temp files.
        let mut child = Command::new(&self.command)
            .args(["stdin", "stdout", "-l", language])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                PipelineError::Configuration(format!("Failed to run {}: {}", self.command, e))
            })?;

        let mut stdin = child.stdin.take().ok_or_else(|| {
            PipelineError::Configuration("Tesseract stdin unavailable".to_string())
        })?;
        let data = image.to_vec();
        let writer = tokio::spawn(async move {
            let result = stdin.write_all(&data).await;
            drop(stdin);
            result
        });

        let output = child.wait_with_output().await.map_err(|e| {
            PipelineError::Parse(format!("Failed to read tesseract output: {}", e))
        })?;

        if let Ok(Err(e)) = writer.await {
            debug!("Tesseract closed stdin early: {}", e);
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::Parse(format!(
                "Tesseract failed: {}",
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
