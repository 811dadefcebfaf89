//! Persistence collaborator.
//!
//! The session core only needs "look up a task by id" and "store a result".
//! `PgStore` backs a real deployment; `MemoryStore` runs when no database is
//! configured and in tests.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::proctor::{NewProctorEvent, ProctorEventRow};
use crate::models::submission::{CodeSubmissionRow, NewSubmission};
use crate::models::task::CodingTask;

pub mod postgres;

pub use postgres::PgStore;

#[async_trait]
pub trait InterviewStore: Send + Sync {
    /// Returns `Ok(None)` when no task has this id (including ids that are not UUIDs).
    async fn find_task(&self, task_id: &str) -> Result<Option<CodingTask>>;

    async fn insert_task(&self, task: &CodingTask) -> Result<()>;

    async fn save_submission(&self, submission: &NewSubmission) -> Result<Uuid>;

    async fn record_proctor_event(&self, session_id: &str, event: &NewProctorEvent) -> Result<()>;

    /// All proctor events of a session, oldest first.
    async fn proctor_events(&self, session_id: &str) -> Result<Vec<ProctorEventRow>>;
}

/// In-process store. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    tasks: RwLock<HashMap<Uuid, CodingTask>>,
    submissions: RwLock<Vec<CodeSubmissionRow>>,
    proctor_events: RwLock<Vec<ProctorEventRow>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn submissions(&self) -> Vec<CodeSubmissionRow> {
        self.submissions.read().await.clone()
    }
}

#[async_trait]
impl InterviewStore for MemoryStore {
    async fn find_task(&self, task_id: &str) -> Result<Option<CodingTask>> {
        let Ok(id) = Uuid::parse_str(task_id) else {
            return Ok(None);
        };
        Ok(self.tasks.read().await.get(&id).cloned())
    }

    async fn insert_task(&self, task: &CodingTask) -> Result<()> {
        self.tasks.write().await.insert(task.id, task.clone());
        Ok(())
    }

    async fn save_submission(&self, submission: &NewSubmission) -> Result<Uuid> {
        let id = Uuid::new_v4();
        self.submissions.write().await.push(CodeSubmissionRow {
            id,
            coding_task_id: submission.coding_task_id,
            session_id: submission.session_id.clone(),
            code: submission.code.clone(),
            language: submission.language.clone(),
            result: submission.result.clone(),
            score: submission.score,
            submitted_at: Utc::now(),
        });
        Ok(id)
    }

    async fn record_proctor_event(&self, session_id: &str, event: &NewProctorEvent) -> Result<()> {
        self.proctor_events.write().await.push(ProctorEventRow {
            id: Uuid::new_v4(),
            session_id: session_id.to_string(),
            event_type: event.event_type.clone(),
            details: event.details.clone(),
            severity: event.severity.as_str().to_string(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn proctor_events(&self, session_id: &str) -> Result<Vec<ProctorEventRow>> {
        Ok(self
            .proctor_events
            .read()
            .await
            .iter()
            .filter(|e| e.session_id == session_id)
            .cloned()
            .collect())
    }
}
