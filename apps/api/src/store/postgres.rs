use anyhow::Result;
use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::models::proctor::{NewProctorEvent, ProctorEventRow};
use crate::models::submission::NewSubmission;
use crate::models::task::{CodingTask, CodingTaskRow};
use crate::store::InterviewStore;

/// Postgres-backed store. Schema lives in `migrations/`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InterviewStore for PgStore {
    async fn find_task(&self, task_id: &str) -> Result<Option<CodingTask>> {
        let Ok(id) = Uuid::parse_str(task_id) else {
            return Ok(None);
        };
        let row: Option<CodingTaskRow> = sqlx::query_as("SELECT * FROM coding_tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(CodingTask::from))
    }

    async fn insert_task(&self, task: &CodingTask) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO coding_tasks
                (id, session_id, title, description, starter_code, test_cases,
                 language, difficulty, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(task.id)
        .bind(&task.session_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(&task.starter_code)
        .bind(Json(&task.test_cases))
        .bind(&task.language)
        .bind(&task.difficulty)
        .bind(task.created_at)
        .execute(&self.pool)
        .await?;

        info!("Inserted coding task {} for session {}", task.id, task.session_id);
        Ok(())
    }

    async fn save_submission(&self, submission: &NewSubmission) -> Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO code_submissions
                (id, coding_task_id, session_id, code, language, result, score)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(id)
        .bind(submission.coding_task_id)
        .bind(&submission.session_id)
        .bind(&submission.code)
        .bind(&submission.language)
        .bind(&submission.result)
        .bind(submission.score)
        .execute(&self.pool)
        .await?;

        info!(
            "Stored submission {id} for task {} (score {:.1})",
            submission.coding_task_id, submission.score
        );
        Ok(id)
    }

    async fn record_proctor_event(&self, session_id: &str, event: &NewProctorEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO proctor_events (id, session_id, event_type, details, severity)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(session_id)
        .bind(&event.event_type)
        .bind(&event.details)
        .bind(event.severity.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn proctor_events(&self, session_id: &str) -> Result<Vec<ProctorEventRow>> {
        Ok(sqlx::query_as::<_, ProctorEventRow>(
            "SELECT * FROM proctor_events WHERE session_id = $1 ORDER BY created_at ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?)
    }
}
