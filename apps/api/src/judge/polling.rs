//! Fixed-interval polling of a submitted program until it reaches a terminal
//! status. No backoff, no jitter: one fetch per interval up to a hard ceiling.

use std::time::Duration;

use tracing::{debug, warn};

use crate::errors::CoreError;
use crate::judge::{CodeExecutor, ExecutionRequest, ExecutionResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
    /// When set, a failed fetch spends an attempt instead of aborting the poll.
    pub tolerate_fetch_errors: bool,
}

impl PollPolicy {
    /// Interactive `run_code`: at most 15 fetches, 15s overall.
    pub const INTERACTIVE: PollPolicy = PollPolicy {
        max_attempts: 15,
        interval: Duration::from_secs(1),
        tolerate_fetch_errors: false,
    };

    /// One scored test case: at most 30 fetches.
    pub const SCORED: PollPolicy = PollPolicy {
        max_attempts: 30,
        interval: Duration::from_secs(1),
        tolerate_fetch_errors: true,
    };
}

/// Fetches `token` until its status is terminal or the attempt budget runs out.
///
/// Returns `CoreError::Timeout` after exactly `policy.max_attempts` fetches
/// without a terminal status. The task sleeps between attempts, never after
/// the last one.
pub async fn poll_until_terminal(
    executor: &dyn CodeExecutor,
    token: &str,
    policy: &PollPolicy,
) -> Result<ExecutionResult, CoreError> {
    for attempt in 1..=policy.max_attempts {
        match executor.fetch_result(token).await {
            Ok(result) if result.is_terminal() => {
                debug!(
                    "Submission {token} finished with status {} after {attempt} attempt(s)",
                    result.status.id
                );
                return Ok(result);
            }
            Ok(_) => {}
            Err(e) if policy.tolerate_fetch_errors => {
                warn!("Polling {token} attempt {attempt} failed: {e}");
            }
            Err(e) => return Err(e),
        }

        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }

    warn!(
        "Submission {token} still running after {} attempts",
        policy.max_attempts
    );
    Err(CoreError::Timeout {
        attempts: policy.max_attempts,
    })
}

/// Submits a program and waits for its terminal result.
pub async fn execute(
    executor: &dyn CodeExecutor,
    request: &ExecutionRequest,
    policy: &PollPolicy,
) -> Result<ExecutionResult, CoreError> {
    let token = executor.submit(request).await?;
    poll_until_terminal(executor, &token, policy).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::testing::{accepted, processing, ScriptedExecutor};

    #[tokio::test(start_paused = true)]
    async fn test_returns_first_terminal_result() {
        let executor = ScriptedExecutor::new(vec![vec![processing(), processing(), accepted("42")]]);

        let result = poll_until_terminal(&executor, "tok-0", &PollPolicy::INTERACTIVE)
            .await
            .unwrap();

        assert_eq!(result.stdout.as_deref(), Some("42"));
        assert_eq!(executor.fetch_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interactive_budget_is_exactly_fifteen_fetches() {
        let executor = ScriptedExecutor::never_finishes();
        let started = tokio::time::Instant::now();

        let err = poll_until_terminal(&executor, "tok-0", &PollPolicy::INTERACTIVE)
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::Timeout { attempts: 15 }));
        assert_eq!(err.to_string(), "Execution timeout");
        assert_eq!(executor.fetch_count(), 15);
        assert_eq!(started.elapsed(), Duration::from_secs(14));
    }

    #[tokio::test(start_paused = true)]
    async fn test_scored_budget_is_exactly_thirty_fetches() {
        let executor = ScriptedExecutor::never_finishes();

        let err = poll_until_terminal(&executor, "tok-0", &PollPolicy::SCORED)
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::Timeout { attempts: 30 }));
        assert_eq!(executor.fetch_count(), 30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_error_aborts_interactive_poll() {
        let executor = ScriptedExecutor::new(vec![vec![processing()]]).failing_fetches();

        let err = poll_until_terminal(&executor, "tok-0", &PollPolicy::INTERACTIVE)
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::Dependency { .. }));
        assert_eq!(executor.fetch_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_errors_spend_scored_attempts() {
        let executor = ScriptedExecutor::new(vec![vec![processing()]]).failing_fetches();

        let err = poll_until_terminal(&executor, "tok-0", &PollPolicy::SCORED)
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::Timeout { attempts: 30 }));
        assert_eq!(executor.fetch_count(), 30);
    }
}
