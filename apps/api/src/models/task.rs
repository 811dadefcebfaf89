use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// One input/expected-output pair of a coding task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    #[serde(default)]
    pub input: String,
    #[serde(alias = "expected")]
    pub expected_output: String,
}

/// A coding exercise bound to an interview session. Read-only to the session core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodingTask {
    pub id: Uuid,
    pub session_id: String,
    pub title: String,
    pub description: String,
    pub starter_code: String,
    pub test_cases: Vec<TestCase>,
    pub language: String,
    pub difficulty: String,
    pub created_at: DateTime<Utc>,
}

/// Payload accepted when registering a new task.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCodingTask {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub starter_code: String,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_difficulty")]
    pub difficulty: String,
}

fn default_language() -> String {
    "python".to_string()
}

fn default_difficulty() -> String {
    "medium".to_string()
}

impl NewCodingTask {
    pub fn into_task(self, session_id: &str) -> CodingTask {
        CodingTask {
            id: Uuid::new_v4(),
            session_id: session_id.to_string(),
            title: self.title,
            description: self.description,
            starter_code: self.starter_code,
            test_cases: self.test_cases,
            language: self.language,
            difficulty: self.difficulty,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct CodingTaskRow {
    pub id: Uuid,
    pub session_id: String,
    pub title: String,
    pub description: String,
    pub starter_code: String,
    pub test_cases: Json<Vec<TestCase>>,
    pub language: String,
    pub difficulty: String,
    pub created_at: DateTime<Utc>,
}

impl From<CodingTaskRow> for CodingTask {
    fn from(row: CodingTaskRow) -> Self {
        CodingTask {
            id: row.id,
            session_id: row.session_id,
            title: row.title,
            description: row.description,
            starter_code: row.starter_code,
            test_cases: row.test_cases.0,
            language: row.language,
            difficulty: row.difficulty,
            created_at: row.created_at,
        }
    }
}
