//! Text generation backends.
//!
//! Every caller goes through the `TextGenerator` trait; the concrete backend
//! is chosen once at startup from `LLM_ENGINE`. The only contract is "text in,
//! text out": prompt construction and JSON extraction belong to the callers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{Config, LlmEngine};
use crate::errors::CoreError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,
}

impl From<LlmError> for CoreError {
    fn from(err: LlmError) -> Self {
        CoreError::dependency("llm", err.to_string())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 400,
            temperature: 0.7,
        }
    }
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, params: GenerationParams) -> Result<String, LlmError>;

    /// Short backend name, reported to clients for transparency.
    fn engine(&self) -> &'static str;
}

pub fn from_config(config: &Config) -> Arc<dyn TextGenerator> {
    match config.llm_engine {
        LlmEngine::TextGen => Arc::new(HttpGenerator::new(
            HttpBackend::TextGen,
            config.textgen_url.clone(),
        )),
        LlmEngine::LlamaCpp => Arc::new(HttpGenerator::new(
            HttpBackend::LlamaCpp,
            config.llama_cpp_url.clone(),
        )),
        LlmEngine::Mock => Arc::new(MockGenerator::default()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpBackend {
    /// text-generation-webui blocking API.
    TextGen,
    /// llama.cpp server.
    LlamaCpp,
}

#[derive(Debug, Serialize)]
struct TextGenRequest<'a> {
    prompt: &'a str,
    max_new_tokens: u32,
    temperature: f32,
    do_sample: bool,
    top_p: f32,
    top_k: u32,
    repetition_penalty: f32,
    seed: i64,
}

#[derive(Debug, Serialize)]
struct LlamaCppRequest<'a> {
    prompt: &'a str,
    n_predict: u32,
    temperature: f32,
    top_k: u32,
    top_p: f32,
    repeat_penalty: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct TextGenResponse {
    #[serde(default)]
    results: Vec<TextGenResult>,
}

#[derive(Debug, Deserialize)]
struct TextGenResult {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct LlamaCppResponse {
    #[serde(default)]
    content: String,
}

/// HTTP-backed generator with retry on 429/5xx.
#[derive(Clone)]
pub struct HttpGenerator {
    client: Client,
    backend: HttpBackend,
    base_url: String,
}

impl HttpGenerator {
    pub fn new(backend: HttpBackend, base_url: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("Failed to build HTTP client"),
            backend,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn request_body(&self, prompt: &str, params: GenerationParams) -> Result<Value, LlmError> {
        let body = match self.backend {
            HttpBackend::TextGen => serde_json::to_value(TextGenRequest {
                prompt,
                max_new_tokens: params.max_tokens,
                temperature: params.temperature,
                do_sample: true,
                top_p: 0.9,
                top_k: 40,
                repetition_penalty: 1.1,
                seed: -1,
            }),
            HttpBackend::LlamaCpp => serde_json::to_value(LlamaCppRequest {
                prompt,
                n_predict: params.max_tokens,
                temperature: params.temperature,
                top_k: 40,
                top_p: 0.9,
                repeat_penalty: 1.1,
                stream: false,
            }),
        };
        body.map_err(|e| LlmError::Api {
            status: 0,
            message: format!("Failed to encode request: {e}"),
        })
    }

    fn endpoint(&self) -> String {
        match self.backend {
            HttpBackend::TextGen => format!("{}/api/v1/generate", self.base_url),
            HttpBackend::LlamaCpp => format!("{}/completion", self.base_url),
        }
    }

    fn extract_text(&self, body: &str) -> Result<String, LlmError> {
        let text = match self.backend {
            HttpBackend::TextGen => serde_json::from_str::<TextGenResponse>(body)
                .ok()
                .and_then(|r| r.results.into_iter().next())
                .map(|r| r.text),
            HttpBackend::LlamaCpp => serde_json::from_str::<LlamaCppResponse>(body)
                .ok()
                .map(|r| r.content),
        };
        text.map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(LlmError::EmptyContent)
    }
}

#[async_trait]
impl TextGenerator for HttpGenerator {
    async fn generate(&self, prompt: &str, params: GenerationParams) -> Result<String, LlmError> {
        let body = self.request_body(prompt, params)?;
        let url = self.endpoint();
        let mut last_error: Option<LlmError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = match self.client.post(&url).json(&body).send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 || status.is_server_error() {
                warn!("LLM backend returned {}: {}", status, text);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: text,
                });
                continue;
            }

            if !status.is_success() {
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message: text,
                });
            }

            debug!("LLM call succeeded ({} bytes)", text.len());
            return self.extract_text(&text);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }

    fn engine(&self) -> &'static str {
        match self.backend {
            HttpBackend::TextGen => "textgen",
            HttpBackend::LlamaCpp => "llama-cpp",
        }
    }
}

const MOCK_RESPONSES: &[&str] = &[
    "Walk me through a system you designed end to end and the trade-offs you made.",
    "Describe a production incident you owned. How did you find the root cause?",
    "How would you design a rate limiter shared by several API servers?",
];

/// Offline generator returning canned text in rotation.
#[derive(Default)]
pub struct MockGenerator {
    next: AtomicUsize,
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, _prompt: &str, _params: GenerationParams) -> Result<String, LlmError> {
        let i = self.next.fetch_add(1, Ordering::Relaxed);
        Ok(MOCK_RESPONSES[i % MOCK_RESPONSES.len()].to_string())
    }

    fn engine(&self) -> &'static str {
        "mock"
    }
}
