//! Scripted `CodeExecutor` for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::errors::CoreError;
use crate::judge::{
    CodeExecutor, ExecutionRequest, ExecutionResult, JudgeStatus, STATUS_ACCEPTED,
    STATUS_PROCESSING,
};

pub fn with_status(id: i64, description: &str) -> ExecutionResult {
    ExecutionResult {
        status: JudgeStatus {
            id,
            description: description.to_string(),
        },
        ..Default::default()
    }
}

pub fn processing() -> ExecutionResult {
    with_status(STATUS_PROCESSING, "Processing")
}

pub fn accepted(stdout: &str) -> ExecutionResult {
    ExecutionResult {
        stdout: Some(stdout.to_string()),
        time: Some("0.010".to_string()),
        memory: Some(3_100),
        ..with_status(STATUS_ACCEPTED, "Accepted")
    }
}

pub fn runtime_error(stderr: &str) -> ExecutionResult {
    ExecutionResult {
        stderr: Some(stderr.to_string()),
        ..with_status(11, "Runtime Error (NZEC)")
    }
}

/// Plays back one script of results per submission, in submission order.
/// Token `tok-N` belongs to the N-th submission. The last entry of a script
/// repeats forever; submissions without a script stay "processing".
pub struct ScriptedExecutor {
    scripts: Mutex<Vec<VecDeque<ExecutionResult>>>,
    submitted: Mutex<Vec<ExecutionRequest>>,
    fetches: AtomicU32,
    fail_fetches: bool,
    fail_submits: bool,
}

impl ScriptedExecutor {
    pub fn new(scripts: Vec<Vec<ExecutionResult>>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into_iter().map(VecDeque::from).collect()),
            submitted: Mutex::new(Vec::new()),
            fetches: AtomicU32::new(0),
            fail_fetches: false,
            fail_submits: false,
        }
    }

    pub fn never_finishes() -> Self {
        Self::new(vec![])
    }

    pub fn failing_fetches(mut self) -> Self {
        self.fail_fetches = true;
        self
    }

    pub fn failing_submits(mut self) -> Self {
        self.fail_submits = true;
        self
    }

    pub fn fetch_count(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn submitted(&self) -> Vec<ExecutionRequest> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl CodeExecutor for ScriptedExecutor {
    async fn submit(&self, request: &ExecutionRequest) -> Result<String, CoreError> {
        if self.fail_submits {
            return Err(CoreError::dependency("judge0", "connection refused"));
        }
        let mut submitted = self.submitted.lock().unwrap();
        submitted.push(request.clone());
        Ok(format!("tok-{}", submitted.len() - 1))
    }

    async fn fetch_result(&self, token: &str) -> Result<ExecutionResult, CoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetches {
            return Err(CoreError::dependency("judge0", "Result fetch timed out"));
        }

        let index: usize = token
            .strip_prefix("tok-")
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| CoreError::protocol("judge0", format!("unknown token {token}")))?;

        let mut scripts = self.scripts.lock().unwrap();
        let result = match scripts.get_mut(index) {
            Some(script) if script.len() > 1 => script.pop_front(),
            Some(script) => script.front().cloned(),
            None => None,
        };
        Ok(result.unwrap_or_else(processing))
    }
}
