//! Speech-to-text backends behind the `Transcriber` trait, selected once at
//! startup from `STT_ENGINE`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::{Config, SttEngine};
use crate::errors::CoreError;

const SERVICE: &str = "stt";
const TRANSCRIBE_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: Bytes, filename: &str) -> Result<String, CoreError>;

    fn engine(&self) -> &'static str;
}

pub fn from_config(config: &Config) -> Arc<dyn Transcriber> {
    match config.stt_engine {
        SttEngine::Vosk => Arc::new(VoskTranscriber::new(config.vosk_server_url.clone())),
        SttEngine::Mock => Arc::new(MockTranscriber::default()),
    }
}

#[derive(Debug, Deserialize)]
struct VoskResponse {
    #[serde(default)]
    text: String,
}

/// Client for a Vosk transcription server (`POST /transcribe`, multipart `audio`).
pub struct VoskTranscriber {
    client: Client,
    base_url: String,
}

impl VoskTranscriber {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(TRANSCRIBE_TIMEOUT)
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Transcriber for VoskTranscriber {
    async fn transcribe(&self, audio: Bytes, filename: &str) -> Result<String, CoreError> {
        let part = Part::bytes(audio.to_vec())
            .file_name(filename.to_string())
            .mime_str("audio/wav")
            .map_err(|e| CoreError::protocol(SERVICE, e.to_string()))?;
        let form = Form::new().part("audio", part);

        let response = self
            .client
            .post(format!("{}/transcribe", self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CoreError::dependency(SERVICE, "Vosk transcription timed out")
                } else {
                    CoreError::dependency(SERVICE, format!("Vosk server error: {e}"))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CoreError::dependency(
                SERVICE,
                format!("Vosk server returned {status}: {body}"),
            ));
        }

        let body: VoskResponse = response
            .json()
            .await
            .map_err(|e| CoreError::protocol(SERVICE, format!("Invalid Vosk response: {e}")))?;

        debug!("Transcribed {filename} ({} chars)", body.text.len());
        Ok(body.text.trim().to_string())
    }

    fn engine(&self) -> &'static str {
        "vosk"
    }
}

const MOCK_TRANSCRIPTS: &[&str] = &[
    "I have five years of experience building backend services, mostly in Python and Go.",
    "I start by clarifying requirements, then split the problem into pieces I can ship incrementally.",
    "When a teammate disagrees with me I try to understand their constraints before arguing for mine.",
];

/// Returns canned answers in rotation; used for demos and offline development.
#[derive(Default)]
pub struct MockTranscriber {
    next: AtomicUsize,
}

#[async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(&self, _audio: Bytes, _filename: &str) -> Result<String, CoreError> {
        let i = self.next.fetch_add(1, Ordering::Relaxed);
        Ok(MOCK_TRANSCRIPTS[i % MOCK_TRANSCRIPTS.len()].to_string())
    }

    fn engine(&self) -> &'static str {
        "mock"
    }
}
