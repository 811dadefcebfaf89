//! Remote code execution.
//!
//! Programs run on a Judge0-compatible service using a submit → token → poll
//! protocol. `CodeExecutor` is the seam the session controller and the test
//! runner depend on; `Judge0Client` is the HTTP implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

pub mod client;
pub mod languages;
pub mod polling;
pub mod test_runner;

#[cfg(test)]
pub mod testing;

pub use client::Judge0Client;

/// Judge status id: submission waiting in the queue.
pub const STATUS_IN_QUEUE: i64 = 1;
/// Judge status id: submission currently running.
pub const STATUS_PROCESSING: i64 = 2;
/// Judge status id: program ran to completion.
pub const STATUS_ACCEPTED: i64 = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub source_code: String,
    pub language_id: u32,
    #[serde(default)]
    pub stdin: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JudgeStatus {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub description: String,
}

/// A decoded execution result. Text fields are plain UTF-8.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    #[serde(default)]
    pub status: JudgeStatus,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub compile_output: Option<String>,
    /// Wall time in seconds as reported by the judge, e.g. `"0.012"`.
    pub time: Option<String>,
    /// Peak memory in kilobytes.
    pub memory: Option<i64>,
}

impl ExecutionResult {
    /// Anything other than "queued" or "processing" is terminal.
    pub fn is_terminal(&self) -> bool {
        !matches!(self.status.id, STATUS_IN_QUEUE | STATUS_PROCESSING)
    }

    pub fn is_accepted(&self) -> bool {
        self.status.id == STATUS_ACCEPTED
    }

    /// Diagnostic for a failed run: stderr first, then compiler output.
    pub fn failure_message(&self) -> String {
        [&self.stderr, &self.compile_output]
            .into_iter()
            .flatten()
            .find(|s| !s.is_empty())
            .cloned()
            .unwrap_or_else(|| {
                if self.status.description.is_empty() {
                    "Unknown error".to_string()
                } else {
                    self.status.description.clone()
                }
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageInfo {
    pub id: u32,
    pub name: String,
}

#[async_trait]
pub trait CodeExecutor: Send + Sync {
    /// Queues a program and returns the judge's token for it.
    async fn submit(&self, request: &ExecutionRequest) -> Result<String, CoreError>;

    /// Fetches the current state of a submission.
    async fn fetch_result(&self, token: &str) -> Result<ExecutionResult, CoreError>;

    /// Languages the executor offers. Defaults to the canonical map.
    async fn languages(&self) -> Result<Vec<LanguageInfo>, CoreError> {
        Ok(languages::supported())
    }

    /// Liveness probe against the executor.
    async fn health(&self) -> Result<(), CoreError> {
        Ok(())
    }
}
