//! Per-session message handling for the realtime coding channel.
//!
//! One channel is serviced by one task, which awaits each handler before
//! reading the next frame, so messages of a session are processed strictly in
//! order. `run_code` and `submit_code` hold that task for their whole polling
//! budget; there is no way to cancel them from the same channel.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use futures_util::FutureExt;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::coding::proctor::{paste_alert, tab_switch_alert, PasteEvent, ProctorAlert};
use crate::coding::protocol::{
    parse_client_message, ClientMessage, RunResult, ServerEvent, SubmitResult,
};
use crate::coding::registry::{Outbox, SessionConnection, SessionRegistry};
use crate::coding::snapshots::SnapshotStore;
use crate::errors::CoreError;
use crate::judge::languages;
use crate::judge::polling::{execute, PollPolicy};
use crate::judge::test_runner::TestRunner;
use crate::judge::{CodeExecutor, ExecutionRequest};
use crate::store::InterviewStore;

/// Identifies one live channel. Handed out by `connect`.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub session_id: String,
    pub task_id: String,
    connection_id: Uuid,
}

pub struct SessionController {
    registry: Arc<SessionRegistry>,
    snapshots: Arc<SnapshotStore>,
    executor: Arc<dyn CodeExecutor>,
    runner: TestRunner,
    store: Arc<dyn InterviewStore>,
    run_policy: PollPolicy,
}

impl SessionController {
    pub fn new(
        registry: Arc<SessionRegistry>,
        snapshots: Arc<SnapshotStore>,
        executor: Arc<dyn CodeExecutor>,
        runner: TestRunner,
        store: Arc<dyn InterviewStore>,
    ) -> Self {
        Self {
            registry,
            snapshots,
            executor,
            runner,
            store,
            run_policy: PollPolicy::INTERACTIVE,
        }
    }

    /// Registers a fresh connection for the session. Snapshot history from a
    /// previous connection is kept.
    pub async fn connect(&self, session_id: &str, task_id: &str, outbox: Outbox) -> ConnectionHandle {
        let connection = SessionConnection::new(task_id, outbox);
        let connection_id = connection.connection_id;

        if self.registry.register(session_id, connection).await.is_some() {
            info!("Session {session_id} reconnected; previous channel superseded");
        }
        self.snapshots.ensure_session(session_id).await;

        info!("Coding channel connected: session {session_id}, task {task_id}");
        ConnectionHandle {
            session_id: session_id.to_string(),
            task_id: task_id.to_string(),
            connection_id,
        }
    }

    /// Drops the connection from the registry. Snapshot history stays.
    pub async fn disconnect(&self, handle: &ConnectionHandle) {
        if self
            .registry
            .remove(&handle.session_id, handle.connection_id)
            .await
        {
            info!(
                "Coding channel disconnected: session {}, task {}",
                handle.session_id, handle.task_id
            );
        }
    }

    /// Whether this channel is still the session's registered connection.
    pub async fn is_current(&self, handle: &ConnectionHandle) -> bool {
        self.registry
            .is_current(&handle.session_id, handle.connection_id)
            .await
    }

    /// Handles one raw inbound frame. Never fails: every problem becomes an
    /// event on the same channel.
    pub async fn handle_text(&self, handle: &ConnectionHandle, raw: &str) {
        match parse_client_message(raw) {
            Ok(message) => self.dispatch(handle, message).await,
            Err(e) => {
                debug!("Rejected frame on session {}: {e}", handle.session_id);
                self.send(handle, ServerEvent::error(e.to_string())).await;
            }
        }
    }

    pub async fn dispatch(&self, handle: &ConnectionHandle, message: ClientMessage) {
        let kind = message.kind();
        let outcome = AssertUnwindSafe(self.route(handle, message))
            .catch_unwind()
            .await;

        let failure = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e.to_string(),
            Err(panic) => panic_message(panic.as_ref()),
        };

        warn!(
            "Handler for {kind} failed on session {}: {failure}",
            handle.session_id
        );
        self.send(
            handle,
            ServerEvent::error(format!("Error handling message: {failure}")),
        )
        .await;
    }

    async fn route(&self, handle: &ConnectionHandle, message: ClientMessage) -> Result<(), CoreError> {
        match message {
            ClientMessage::CodeEdit { code, cursor } => self.handle_code_edit(handle, code, cursor).await,
            ClientMessage::RunCode {
                code,
                language,
                input,
            } => {
                self.handle_run_code(handle, code, &language, input.unwrap_or_default())
                    .await
            }
            ClientMessage::SubmitCode { code, language } => {
                self.handle_submit_code(handle, code, &language).await
            }
            ClientMessage::PasteEvent { content } => self.handle_paste(handle, &content).await,
            ClientMessage::TabSwitch {} => self.handle_tab_switch(handle).await,
        }
    }

    async fn handle_code_edit(
        &self,
        handle: &ConnectionHandle,
        code: String,
        cursor: Value,
    ) -> Result<(), CoreError> {
        let now = Utc::now();

        self.touch(handle, |conn| conn.last_code = code.clone())
            .await?;
        self.snapshots
            .record_edit(&handle.session_id, &code, cursor, now)
            .await;

        self.send(handle, ServerEvent::EditAck { timestamp: now }).await;
        Ok(())
    }

    async fn handle_run_code(
        &self,
        handle: &ConnectionHandle,
        code: String,
        language: &str,
        stdin: String,
    ) -> Result<(), CoreError> {
        self.touch(handle, |_| ()).await?;

        let language_id = match languages::resolve(language) {
            Ok(id) => id,
            Err(e) => {
                self.send(handle, ServerEvent::RunResult(RunResult::failed(e.to_string())))
                    .await;
                return Ok(());
            }
        };

        let request = ExecutionRequest {
            source_code: code,
            language_id,
            stdin,
        };
        let result = match execute(self.executor.as_ref(), &request, &self.run_policy).await {
            Ok(result) => RunResult::completed(result),
            Err(e) => {
                warn!("run_code failed on session {}: {e}", handle.session_id);
                RunResult::failed(e.to_string())
            }
        };

        self.send(handle, ServerEvent::RunResult(result)).await;
        Ok(())
    }

    async fn handle_submit_code(
        &self,
        handle: &ConnectionHandle,
        code: String,
        language: &str,
    ) -> Result<(), CoreError> {
        let task_id = self
            .touch(handle, |conn| {
                conn.last_code = code.clone();
                conn.task_id.clone()
            })
            .await?;

        let event = match self.runner.run(&task_id, &code, language).await {
            Ok(report) => {
                // attribute to the channel's session, not the task's
                let mut submission = report.to_submission();
                submission.session_id = handle.session_id.clone();
                if let Err(e) = self.store.save_submission(&submission).await {
                    warn!(
                        "Failed to store submission for session {}: {e:#}",
                        handle.session_id
                    );
                }
                SubmitResult::completed(&report)
            }
            Err(e) => {
                warn!("submit_code failed on session {}: {e}", handle.session_id);
                SubmitResult::failed(e.to_string())
            }
        };

        self.send(handle, ServerEvent::SubmitResult(event)).await;
        Ok(())
    }

    async fn handle_paste(&self, handle: &ConnectionHandle, content: &str) -> Result<(), CoreError> {
        let paste = PasteEvent::capture(content, Utc::now());
        let length = paste.length;
        let details = paste.details();

        self.touch(handle, move |conn| conn.paste_events.push(paste))
            .await?;

        if let Some(alert) = paste_alert(length) {
            self.raise_alert(handle, alert, details).await;
        }
        Ok(())
    }

    async fn handle_tab_switch(&self, handle: &ConnectionHandle) -> Result<(), CoreError> {
        let count = self
            .touch(handle, |conn| {
                conn.tab_switches += 1;
                conn.tab_switches
            })
            .await?;

        if let Some(alert) = tab_switch_alert(count) {
            self.raise_alert(handle, alert, json!({ "count": count }))
                .await;
        }
        Ok(())
    }

    /// Pushes the alert to the client and records it. Recording failures are
    /// only logged.
    async fn raise_alert(&self, handle: &ConnectionHandle, alert: ProctorAlert, details: Value) {
        info!(
            "Proctor alert on session {}: {} ({})",
            handle.session_id, alert.event, alert.severity
        );
        let event = alert.to_event(details);
        self.send(handle, ServerEvent::ProctorAlert(alert)).await;

        if let Err(e) = self
            .store
            .record_proctor_event(&handle.session_id, &event)
            .await
        {
            warn!(
                "Failed to record proctor event for session {}: {e:#}",
                handle.session_id
            );
        }
    }

    /// Applies `f` to the live connection and bumps its activity timestamp.
    async fn touch<R>(
        &self,
        handle: &ConnectionHandle,
        f: impl FnOnce(&mut SessionConnection) -> R,
    ) -> Result<R, CoreError> {
        self.registry
            .with_connection(&handle.session_id, handle.connection_id, |conn| {
                conn.last_activity = Utc::now();
                f(conn)
            })
            .await
            .ok_or_else(|| CoreError::NotFound(format!("Session {}", handle.session_id)))
    }

    async fn send(&self, handle: &ConnectionHandle, event: ServerEvent) {
        let outbox = self
            .registry
            .outbox(&handle.session_id, handle.connection_id)
            .await;

        match outbox {
            Some(outbox) => {
                if outbox.send(event).is_err() {
                    debug!("Outbound queue closed for session {}", handle.session_id);
                }
            }
            None => debug!(
                "Dropping event for superseded channel on session {}",
                handle.session_id
            ),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::testing::{accepted, processing, ScriptedExecutor};
    use crate::models::task::{NewCodingTask, TestCase};
    use crate::store::MemoryStore;
    use tokio::sync::mpsc;

    struct Harness {
        controller: SessionController,
        executor: Arc<ScriptedExecutor>,
        store: Arc<MemoryStore>,
        snapshots: Arc<SnapshotStore>,
        registry: Arc<SessionRegistry>,
    }

    impl Harness {
        fn new(executor: ScriptedExecutor) -> Self {
            let executor = Arc::new(executor);
            let store = Arc::new(MemoryStore::new());
            let registry = Arc::new(SessionRegistry::new());
            let snapshots = Arc::new(SnapshotStore::new());
            let runner = TestRunner::new(executor.clone(), store.clone());
            let controller = SessionController::new(
                registry.clone(),
                snapshots.clone(),
                executor.clone(),
                runner,
                store.clone(),
            );
            Self {
                controller,
                executor,
                store,
                snapshots,
                registry,
            }
        }

        async fn open(&self, task_id: &str) -> (ConnectionHandle, mpsc::UnboundedReceiver<ServerEvent>) {
            let (tx, rx) = mpsc::unbounded_channel();
            let handle = self.controller.connect("session-1", task_id, tx).await;
            (handle, rx)
        }

        async fn add_task(&self, cases: Vec<TestCase>) -> String {
            let task = NewCodingTask {
                title: "Sum".to_string(),
                description: String::new(),
                starter_code: String::new(),
                test_cases: cases,
                language: "python".to_string(),
                difficulty: "easy".to_string(),
            }
            .into_task("session-1");
            self.store.insert_task(&task).await.unwrap();
            task.id.to_string()
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> Vec<Value> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(serde_json::to_value(event).unwrap());
        }
        events
    }

    #[tokio::test]
    async fn test_code_edit_acks_and_snapshots_once_for_duplicate() {
        let h = Harness::new(ScriptedExecutor::never_finishes());
        let (handle, mut rx) = h.open("task").await;

        let frame = r#"{"type":"code_edit","code":"print(1)","cursor":{"line":0}}"#;
        h.controller.handle_text(&handle, frame).await;
        h.controller.handle_text(&handle, frame).await;

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e["type"] == "edit_ack"));
        assert_eq!(h.snapshots.history("session-1").await.len(), 1);

        let last_code = h
            .registry
            .with_connection("session-1", handle.connection_id, |c| c.last_code.clone())
            .await;
        assert_eq!(last_code.as_deref(), Some("print(1)"));
    }

    #[tokio::test]
    async fn test_reconnect_keeps_snapshot_history() {
        let h = Harness::new(ScriptedExecutor::never_finishes());
        let (handle, _rx) = h.open("task").await;
        h.controller
            .handle_text(&handle, r#"{"type":"code_edit","code":"x = 1"}"#)
            .await;
        h.controller.disconnect(&handle).await;
        assert_eq!(h.registry.len().await, 0);

        let (_handle, _rx) = h.open("task").await;
        assert_eq!(h.snapshots.history("session-1").await.len(), 1);
    }

    #[tokio::test]
    async fn test_superseded_channel_is_silenced() {
        let h = Harness::new(ScriptedExecutor::never_finishes());
        let (old, mut old_rx) = h.open("task").await;
        let (new, mut new_rx) = h.open("task").await;

        assert!(!h.controller.is_current(&old).await);
        h.controller.handle_text(&old, r#"{"type":"tab_switch"}"#).await;
        h.controller.disconnect(&old).await;

        assert!(h.controller.is_current(&new).await);
        assert!(drain(&mut old_rx).is_empty());
        assert!(drain(&mut new_rx).is_empty());
    }

    #[tokio::test]
    async fn test_invalid_frames_produce_errors_without_closing() {
        let h = Harness::new(ScriptedExecutor::never_finishes());
        let (handle, mut rx) = h.open("task").await;

        h.controller.handle_text(&handle, "not json").await;
        h.controller.handle_text(&handle, r#"{"type":"dance"}"#).await;
        h.controller
            .handle_text(&handle, r#"{"type":"code_edit","code":"a"}"#)
            .await;

        let events = drain(&mut rx);
        assert_eq!(events[0], json!({"type": "error", "message": "Invalid JSON message"}));
        assert_eq!(events[1]["message"], "Unknown message type: dance");
        assert_eq!(events[2]["type"], "edit_ack");
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_code_returns_terminal_result() {
        let h = Harness::new(ScriptedExecutor::new(vec![vec![processing(), accepted("hi\n")]]));
        let (handle, mut rx) = h.open("task").await;

        h.controller
            .handle_text(
                &handle,
                r#"{"type":"run_code","code":"print('hi')","language":"Python","input":"x"}"#,
            )
            .await;

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["type"], "run_result");
        assert_eq!(events[0]["success"], true);
        assert_eq!(events[0]["stdout"], "hi\n");
        assert_eq!(events[0]["status"]["id"], 3);
        let submitted = h.executor.submitted();
        assert_eq!(submitted[0].language_id, 71);
        assert_eq!(submitted[0].stdin, "x");
    }

    #[tokio::test]
    async fn test_run_code_rejects_unmapped_language_without_executing() {
        let h = Harness::new(ScriptedExecutor::never_finishes());
        let (handle, mut rx) = h.open("task").await;

        h.controller
            .handle_text(&handle, r#"{"type":"run_code","code":"x","language":"cobol"}"#)
            .await;

        let events = drain(&mut rx);
        assert_eq!(events[0]["success"], false);
        assert!(events[0]["error"]
            .as_str()
            .unwrap()
            .starts_with("Unsupported language: cobol"));
        assert!(h.executor.submitted().is_empty());
        assert_eq!(h.executor.fetch_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_code_times_out_after_fifteen_polls() {
        let h = Harness::new(ScriptedExecutor::never_finishes());
        let (handle, mut rx) = h.open("task").await;

        h.controller
            .handle_text(&handle, r#"{"type":"run_code","code":"while True: pass"}"#)
            .await;

        let events = drain(&mut rx);
        assert_eq!(events[0]["success"], false);
        assert_eq!(events[0]["error"], "Execution timeout");
        assert_eq!(h.executor.fetch_count(), 15);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_code_scores_and_persists() {
        let h = Harness::new(ScriptedExecutor::new(vec![
            vec![accepted("6")],
            vec![accepted(" 1 ")],
        ]));
        let task_id = h
            .add_task(vec![
                TestCase {
                    input: "[1,2,3]".to_string(),
                    expected_output: "6".to_string(),
                },
                TestCase {
                    input: "[0]".to_string(),
                    expected_output: "0".to_string(),
                },
            ])
            .await;
        let (handle, mut rx) = h.open(&task_id).await;

        h.controller
            .handle_text(&handle, r#"{"type":"submit_code","code":"print(sum(x))","language":"python"}"#)
            .await;

        let events = drain(&mut rx);
        let result = &events[0];
        assert_eq!(result["type"], "submit_result");
        assert_eq!(result["success"], true);
        assert_eq!(result["score"], 50.0);
        assert_eq!(result["passed_tests"], 1);
        assert_eq!(result["total_tests"], 2);
        assert_eq!(result["test_results"][1]["actual"], "1");

        let stored = h.store.submissions().await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].code, "print(sum(x))");
        assert_eq!(stored[0].session_id, "session-1");
    }

    #[tokio::test]
    async fn test_submit_code_for_missing_task_fails_cleanly() {
        let h = Harness::new(ScriptedExecutor::never_finishes());
        let (handle, mut rx) = h.open("no-such-task").await;

        h.controller
            .handle_text(&handle, r#"{"type":"submit_code","code":"x"}"#)
            .await;

        let events = drain(&mut rx);
        assert_eq!(events[0]["type"], "submit_result");
        assert_eq!(events[0]["success"], false);
        assert_eq!(events[0]["error"], "Coding task no-such-task not found");
    }

    #[tokio::test]
    async fn test_tab_switch_alerts_from_sixth_message() {
        let h = Harness::new(ScriptedExecutor::never_finishes());
        let (handle, mut rx) = h.open("task").await;

        for _ in 0..5 {
            h.controller.handle_text(&handle, r#"{"type":"tab_switch"}"#).await;
        }
        assert!(drain(&mut rx).is_empty());

        h.controller.handle_text(&handle, r#"{"type":"tab_switch"}"#).await;
        h.controller.handle_text(&handle, r#"{"type":"tab_switch"}"#).await;

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["type"], "proctor_alert");
        assert_eq!(events[0]["event"], "excessive_tab_switching");
        assert_eq!(events[0]["severity"], "high");
        assert_eq!(events[1]["message"], "Multiple tab switches detected (7)");

        let recorded = h.store.proctor_events("session-1").await.unwrap();
        assert_eq!(recorded.len(), 2);
    }

    #[tokio::test]
    async fn test_paste_alert_boundary() {
        let h = Harness::new(ScriptedExecutor::never_finishes());
        let (handle, mut rx) = h.open("task").await;

        let frame = |n: usize| json!({"type": "paste_event", "content": "a".repeat(n)}).to_string();
        h.controller.handle_text(&handle, &frame(100)).await;
        assert!(drain(&mut rx).is_empty());

        h.controller.handle_text(&handle, &frame(101)).await;
        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["event"], "large_paste");
        assert_eq!(events[0]["severity"], "medium");

        let pastes = h
            .registry
            .with_connection("session-1", handle.connection_id, |c| {
                c.paste_events.iter().map(|p| p.length).collect::<Vec<_>>()
            })
            .await
            .unwrap();
        assert_eq!(pastes, vec![100, 101]);
    }

    struct PanickingExecutor;

    #[async_trait::async_trait]
    impl CodeExecutor for PanickingExecutor {
        async fn submit(&self, _request: &ExecutionRequest) -> Result<String, CoreError> {
            panic!("judge exploded")
        }

        async fn fetch_result(
            &self,
            _token: &str,
        ) -> Result<crate::judge::ExecutionResult, CoreError> {
            unreachable!("submit never returns a token")
        }
    }

    #[tokio::test]
    async fn test_handler_panic_becomes_error_and_channel_keeps_going() {
        let executor: Arc<dyn CodeExecutor> = Arc::new(PanickingExecutor);
        let store = Arc::new(MemoryStore::new());
        let controller = SessionController::new(
            Arc::new(SessionRegistry::new()),
            Arc::new(SnapshotStore::new()),
            executor.clone(),
            TestRunner::new(executor, store.clone()),
            store,
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = controller.connect("session-1", "task", tx).await;

        controller
            .handle_text(&handle, r#"{"type":"run_code","code":"print(1)","language":"python"}"#)
            .await;
        controller
            .handle_text(&handle, r#"{"type":"code_edit","code":"print(2)"}"#)
            .await;

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            json!({"type": "error", "message": "Error handling message: judge exploded"})
        );
        assert_eq!(events[1]["type"], "edit_ack");
        assert!(controller.is_current(&handle).await);
    }

    #[test]
    fn test_panic_message_extraction() {
        let boxed: Box<dyn Any + Send> = Box::new("kaboom");
        assert_eq!(panic_message(boxed.as_ref()), "kaboom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(boxed.as_ref()), "handler panicked");
    }
}
