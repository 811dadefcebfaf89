//! Scores one submission against every test case of a coding task.
//!
//! Test cases run one after another, each with its own polling budget. A
//! failing or timed-out case never stops the remaining ones.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::CoreError;
use crate::judge::languages;
use crate::judge::polling::{poll_until_terminal, PollPolicy};
use crate::judge::{CodeExecutor, ExecutionRequest, ExecutionResult};
use crate::models::submission::NewSubmission;
use crate::models::task::TestCase;
use crate::store::InterviewStore;

/// Outcome of a single test case. `test_case` is 1-based.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestCaseResult {
    pub test_case: usize,
    pub passed: bool,
    pub expected: String,
    pub actual: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_used: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate of a scored run. Persisting it is the caller's job.
#[derive(Debug, Clone, Serialize)]
pub struct TestRunReport {
    pub task_id: Uuid,
    pub session_id: String,
    #[serde(skip)]
    pub code: String,
    pub language: String,
    pub score: f64,
    pub passed_tests: usize,
    pub total_tests: usize,
    pub test_results: Vec<TestCaseResult>,
}

impl TestRunReport {
    pub fn to_submission(&self) -> NewSubmission {
        NewSubmission {
            coding_task_id: self.task_id,
            session_id: self.session_id.clone(),
            code: self.code.clone(),
            language: self.language.clone(),
            result: serde_json::json!({
                "test_results": self.test_results,
                "passed_tests": self.passed_tests,
                "total_tests": self.total_tests,
                "score": self.score,
            }),
            score: self.score,
        }
    }
}

/// Percentage of passed cases; zero cases score 0.
pub fn compute_score(passed: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        passed as f64 / total as f64 * 100.0
    }
}

#[derive(Clone)]
pub struct TestRunner {
    executor: Arc<dyn CodeExecutor>,
    store: Arc<dyn InterviewStore>,
    policy: PollPolicy,
}

impl TestRunner {
    pub fn new(executor: Arc<dyn CodeExecutor>, store: Arc<dyn InterviewStore>) -> Self {
        Self {
            executor,
            store,
            policy: PollPolicy::SCORED,
        }
    }

    pub async fn run(
        &self,
        task_id: &str,
        source_code: &str,
        language: &str,
    ) -> Result<TestRunReport, CoreError> {
        let task = self
            .store
            .find_task(task_id)
            .await
            .map_err(|e| CoreError::dependency("database", e.to_string()))?
            .ok_or_else(|| CoreError::NotFound(format!("Coding task {task_id}")))?;

        let language_id = languages::resolve(language)?;

        let total_tests = task.test_cases.len();
        let mut test_results = Vec::with_capacity(total_tests);

        for (index, case) in task.test_cases.iter().enumerate() {
            let outcome = self
                .run_case(index + 1, case, source_code, language_id)
                .await;
            test_results.push(outcome);
        }

        let passed_tests = test_results.iter().filter(|r| r.passed).count();
        let score = compute_score(passed_tests, total_tests);

        info!(
            "Task {} scored {score:.1} ({passed_tests}/{total_tests}) in {language}",
            task.id
        );

        Ok(TestRunReport {
            task_id: task.id,
            session_id: task.session_id,
            code: source_code.to_string(),
            language: language.to_string(),
            score,
            passed_tests,
            total_tests,
            test_results,
        })
    }

    async fn run_case(
        &self,
        number: usize,
        case: &TestCase,
        source_code: &str,
        language_id: u32,
    ) -> TestCaseResult {
        let expected = case.expected_output.trim().to_string();
        let request = ExecutionRequest {
            source_code: source_code.to_string(),
            language_id,
            stdin: case.input.clone(),
        };

        let outcome = match self.executor.submit(&request).await {
            Ok(token) => poll_until_terminal(self.executor.as_ref(), &token, &self.policy).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(result) => grade(number, expected, &result),
            Err(e) => {
                warn!("Test case {number} did not complete: {e}");
                TestCaseResult {
                    test_case: number,
                    passed: false,
                    expected,
                    actual: None,
                    execution_time: None,
                    memory_used: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

/// A case passes only when the program was accepted and the trimmed
/// output equals the trimmed expectation exactly.
fn grade(number: usize, expected: String, result: &ExecutionResult) -> TestCaseResult {
    let actual = result.stdout.as_deref().unwrap_or("").trim().to_string();

    if result.is_accepted() {
        TestCaseResult {
            test_case: number,
            passed: actual == expected,
            expected,
            actual: Some(actual),
            execution_time: result.time.clone(),
            memory_used: result.memory,
            error: None,
        }
    } else {
        TestCaseResult {
            test_case: number,
            passed: false,
            expected,
            actual: Some(actual),
            execution_time: None,
            memory_used: None,
            error: Some(result.failure_message()),
        }
    }
}
