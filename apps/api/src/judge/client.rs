//! HTTP client for a Judge0-compatible execution service.
//!
//! All text travels base64-encoded in both directions (`base64_encoded=true`).
//! Every request carries a fixed 10s timeout; there are no retries here, the
//! polling policy in `polling.rs` owns the attempt budget.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::CoreError;
use crate::judge::{CodeExecutor, ExecutionRequest, ExecutionResult, JudgeStatus, LanguageInfo};

const SERVICE: &str = "judge0";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct SubmissionBody {
    source_code: String,
    language_id: u32,
    stdin: String,
    expected_output: String,
    cpu_time_limit: f64,
    cpu_extra_time: f64,
    wall_time_limit: f64,
    memory_limit: u32,
    stack_limit: u32,
    enable_per_process_and_thread_time_limit: bool,
    enable_per_process_and_thread_memory_limit: bool,
}

impl SubmissionBody {
    fn encode(request: &ExecutionRequest) -> Self {
        Self {
            source_code: STANDARD.encode(request.source_code.as_bytes()),
            language_id: request.language_id,
            stdin: if request.stdin.is_empty() {
                String::new()
            } else {
                STANDARD.encode(request.stdin.as_bytes())
            },
            expected_output: String::new(),
            cpu_time_limit: 2.0,
            cpu_extra_time: 0.5,
            wall_time_limit: 5.0,
            memory_limit: 128_000,
            stack_limit: 64_000,
            enable_per_process_and_thread_time_limit: true,
            enable_per_process_and_thread_memory_limit: true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawResult {
    status: Option<JudgeStatus>,
    stdout: Option<String>,
    stderr: Option<String>,
    compile_output: Option<String>,
    time: Option<Value>,
    memory: Option<Value>,
}

impl RawResult {
    fn decode(self) -> ExecutionResult {
        ExecutionResult {
            status: self.status.unwrap_or_default(),
            stdout: self.stdout.as_deref().and_then(decode_field),
            stderr: self.stderr.as_deref().and_then(decode_field),
            compile_output: self.compile_output.as_deref().and_then(decode_field),
            time: self.time.and_then(|v| match v {
                Value::String(s) => Some(s),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            }),
            memory: self.memory.and_then(|v| match v {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.parse().ok(),
                _ => None,
            }),
        }
    }
}

/// Decodes one base64 text field. The judge wraps long payloads across
/// lines, so whitespace is stripped first. Undecodable input is passed
/// through as-is and invalid UTF-8 is replaced lossily.
fn decode_field(raw: &str) -> Option<String> {
    if raw.is_empty() {
        return None;
    }
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    match STANDARD.decode(compact.as_bytes()) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) => {
            debug!("Judge0 field is not valid base64 ({e}); using raw text");
            Some(raw.to_string())
        }
    }
}

fn transport_error(action: &str, err: reqwest::Error) -> CoreError {
    if err.is_timeout() {
        CoreError::dependency(SERVICE, format!("{action} timed out"))
    } else {
        CoreError::dependency(SERVICE, format!("{action} failed: {err}"))
    }
}

#[derive(Clone)]
pub struct Judge0Client {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl Judge0Client {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn with_headers(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("X-RapidAPI-Key", key),
            None => builder,
        }
    }
}

#[async_trait]
impl CodeExecutor for Judge0Client {
    async fn submit(&self, request: &ExecutionRequest) -> Result<String, CoreError> {
        let url = format!("{}/submissions?base64_encoded=true&wait=false", self.base_url);
        let response = self
            .with_headers(self.client.post(&url))
            .json(&SubmissionBody::encode(request))
            .send()
            .await
            .map_err(|e| transport_error("Submission", e))?;

        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::CREATED {
            let body = response.text().await.unwrap_or_default();
            return Err(CoreError::dependency(
                SERVICE,
                format!("Submission failed (status {status}): {body}"),
            ));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| CoreError::protocol(SERVICE, format!("Invalid submission response: {e}")))?;

        let token = body
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| CoreError::protocol(SERVICE, "No token received from Judge0"))?;

        debug!("Judge0 accepted submission (language {}): {token}", request.language_id);
        Ok(token)
    }

    async fn fetch_result(&self, token: &str) -> Result<ExecutionResult, CoreError> {
        let url = format!("{}/submissions/{token}?base64_encoded=true", self.base_url);
        let response = self
            .with_headers(self.client.get(&url))
            .send()
            .await
            .map_err(|e| transport_error("Result fetch", e))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(CoreError::dependency(
                SERVICE,
                format!("Result fetch failed (status {status}): {body}"),
            ));
        }

        let raw: RawResult = response
            .json()
            .await
            .map_err(|e| CoreError::protocol(SERVICE, format!("Invalid result payload: {e}")))?;

        Ok(raw.decode())
    }

    async fn languages(&self) -> Result<Vec<LanguageInfo>, CoreError> {
        let url = format!("{}/languages", self.base_url);
        let response = self
            .with_headers(self.client.get(&url))
            .send()
            .await
            .map_err(|e| transport_error("Language listing", e))?;

        if !response.status().is_success() {
            warn!("Judge0 /languages returned {}", response.status());
            return Err(CoreError::dependency(
                SERVICE,
                format!("Language listing failed (status {})", response.status()),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| CoreError::protocol(SERVICE, format!("Invalid language list: {e}")))
    }

    async fn health(&self) -> Result<(), CoreError> {
        let url = format!("{}/system_info", self.base_url);
        let response = self
            .with_headers(self.client.get(&url))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
            .map_err(|e| transport_error("Health check", e))?;

        if response.status() == StatusCode::OK {
            Ok(())
        } else {
            Err(CoreError::dependency(
                SERVICE,
                format!("Judge0 returned {}", response.status().as_u16()),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_field_handles_wrapped_base64() {
        // "hello world\n" split across lines the way the judge emits it
        assert_eq!(decode_field("aGVsbG8g\nd29ybGQK\n").as_deref(), Some("hello world\n"));
    }

    #[test]
    fn test_decode_field_falls_back_to_raw_text() {
        assert_eq!(decode_field("not base64!").as_deref(), Some("not base64!"));
        assert_eq!(decode_field(""), None);
    }

    #[test]
    fn test_decode_field_is_lossy_on_invalid_utf8() {
        let encoded = STANDARD.encode([0x36, 0xff]);
        assert_eq!(decode_field(&encoded).as_deref(), Some("6\u{fffd}"));
    }

    #[test]
    fn test_raw_result_decodes_all_fields() {
        let raw: RawResult = serde_json::from_value(serde_json::json!({
            "status": {"id": 3, "description": "Accepted"},
            "stdout": STANDARD.encode("6\n"),
            "stderr": null,
            "compile_output": null,
            "time": "0.012",
            "memory": 3148
        }))
        .unwrap();

        let result = raw.decode();
        assert!(result.is_accepted());
        assert_eq!(result.stdout.as_deref(), Some("6\n"));
        assert_eq!(result.stderr, None);
        assert_eq!(result.time.as_deref(), Some("0.012"));
        assert_eq!(result.memory, Some(3148));
    }

    #[test]
    fn test_submission_body_encodes_source_and_limits() {
        let body = SubmissionBody::encode(&ExecutionRequest {
            source_code: "print(1)".to_string(),
            language_id: 71,
            stdin: String::new(),
        });
        assert_eq!(body.source_code, STANDARD.encode("print(1)"));
        assert_eq!(body.stdin, "");
        assert_eq!(body.memory_limit, 128_000);
        assert_eq!(body.stack_limit, 64_000);
        assert_eq!(body.cpu_time_limit, 2.0);
        assert_eq!(body.wall_time_limit, 5.0);
    }
}
