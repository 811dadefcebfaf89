use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// A scored submission handed to the persistence layer.
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub coding_task_id: Uuid,
    pub session_id: String,
    pub code: String,
    pub language: String,
    pub result: Value,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CodeSubmissionRow {
    pub id: Uuid,
    pub coding_task_id: Uuid,
    pub session_id: String,
    pub code: String,
    pub language: String,
    pub result: Value,
    pub score: f64,
    pub submitted_at: DateTime<Utc>,
}
