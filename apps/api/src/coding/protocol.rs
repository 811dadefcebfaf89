//! Wire format of the realtime coding channel.
//!
//! Every frame is a JSON object whose `type` field selects the payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::coding::proctor::ProctorAlert;
use crate::errors::CoreError;
use crate::judge::test_runner::{TestCaseResult, TestRunReport};
use crate::judge::{ExecutionResult, JudgeStatus};

const KNOWN_TYPES: &[&str] = &["code_edit", "run_code", "submit_code", "paste_event", "tab_switch"];

fn default_language() -> String {
    "python".to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    CodeEdit {
        #[serde(default)]
        code: String,
        #[serde(default)]
        cursor: Value,
    },
    RunCode {
        #[serde(default)]
        code: String,
        #[serde(default = "default_language")]
        language: String,
        #[serde(default)]
        input: Option<String>,
    },
    SubmitCode {
        #[serde(default)]
        code: String,
        #[serde(default = "default_language")]
        language: String,
    },
    PasteEvent {
        #[serde(default)]
        content: String,
    },
    TabSwitch {},
}

impl ClientMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::CodeEdit { .. } => "code_edit",
            ClientMessage::RunCode { .. } => "run_code",
            ClientMessage::SubmitCode { .. } => "submit_code",
            ClientMessage::PasteEvent { .. } => "paste_event",
            ClientMessage::TabSwitch {} => "tab_switch",
        }
    }
}

/// Parses one inbound frame, distinguishing broken JSON, unknown types and
/// payloads that do not fit their type.
pub fn parse_client_message(raw: &str) -> Result<ClientMessage, CoreError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|_| CoreError::MalformedMessage("Invalid JSON message".to_string()))?;

    let kind = match value.get("type") {
        Some(Value::String(kind)) => kind.clone(),
        Some(other) => {
            return Err(CoreError::MalformedMessage(format!(
                "Unknown message type: {other}"
            )))
        }
        None => {
            return Err(CoreError::MalformedMessage(
                "Message is missing a 'type' field".to_string(),
            ))
        }
    };

    if !KNOWN_TYPES.contains(&kind.as_str()) {
        return Err(CoreError::MalformedMessage(format!("Unknown message type: {kind}")));
    }

    serde_json::from_value(value)
        .map_err(|e| CoreError::MalformedMessage(format!("Invalid {kind} payload: {e}")))
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RunResult {
    Completed {
        success: bool,
        stdout: Option<String>,
        stderr: Option<String>,
        time: Option<String>,
        memory: Option<i64>,
        status: JudgeStatus,
    },
    Failed {
        success: bool,
        error: String,
    },
}

impl RunResult {
    pub fn completed(result: ExecutionResult) -> Self {
        RunResult::Completed {
            success: true,
            stdout: result.stdout,
            stderr: result.stderr,
            time: result.time,
            memory: result.memory,
            status: result.status,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        RunResult::Failed {
            success: false,
            error: error.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SubmitResult {
    Completed {
        success: bool,
        score: f64,
        passed_tests: usize,
        total_tests: usize,
        test_results: Vec<TestCaseResult>,
    },
    Failed {
        success: bool,
        error: String,
    },
}

impl SubmitResult {
    pub fn completed(report: &TestRunReport) -> Self {
        SubmitResult::Completed {
            success: true,
            score: report.score,
            passed_tests: report.passed_tests,
            total_tests: report.total_tests,
            test_results: report.test_results.clone(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        SubmitResult::Failed {
            success: false,
            error: error.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    EditAck { timestamp: DateTime<Utc> },
    RunResult(RunResult),
    SubmitResult(SubmitResult),
    ProctorAlert(ProctorAlert),
    Error { message: String },
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
        }
    }
}
