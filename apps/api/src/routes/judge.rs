//! REST surface of the code executor and test runner.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use crate::errors::AppError;
use crate::judge::test_runner::TestRunReport;
use crate::judge::{languages, ExecutionRequest, ExecutionResult, LanguageInfo};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct RunTestsRequest {
    pub source_code: String,
    pub language: String,
}

#[derive(Debug, Serialize)]
pub struct RunTestsResponse {
    pub submission_id: Uuid,
    #[serde(flatten)]
    pub report: TestRunReport,
}

#[derive(Debug, Serialize)]
pub struct LanguagesResponse {
    pub languages: Vec<LanguageInfo>,
}

/// POST /judge/submit
pub async fn handle_submit(
    State(state): State<AppState>,
    Json(request): Json<ExecutionRequest>,
) -> Result<Json<SubmitResponse>, AppError> {
    let token = state.executor.submit(&request).await?;
    Ok(Json(SubmitResponse { token }))
}

/// GET /judge/result/:token
pub async fn handle_result(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<ExecutionResult>, AppError> {
    Ok(Json(state.executor.fetch_result(&token).await?))
}

/// POST /judge/run_tests/:task_id
///
/// Scores the code against every test case of the task and stores the result.
pub async fn handle_run_tests(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    Json(request): Json<RunTestsRequest>,
) -> Result<Json<RunTestsResponse>, AppError> {
    let report = state
        .runner
        .run(&task_id, &request.source_code, &request.language)
        .await?;

    let submission_id = state.store.save_submission(&report.to_submission()).await?;

    Ok(Json(RunTestsResponse {
        submission_id,
        report,
    }))
}

/// GET /judge/languages
///
/// Falls back to the built-in table when the judge cannot be reached.
pub async fn handle_languages(State(state): State<AppState>) -> Json<LanguagesResponse> {
    let languages = match state.executor.languages().await {
        Ok(list) => list,
        Err(e) => {
            warn!("Falling back to built-in language table: {e}");
            languages::supported()
        }
    };
    Json(LanguagesResponse { languages })
}

/// GET /judge/health
pub async fn handle_health(State(state): State<AppState>) -> Json<Value> {
    match state.executor.health().await {
        Ok(()) => Json(json!({
            "status": "healthy",
            "judge0_url": state.config.judge0_url,
        })),
        Err(e) => Json(json!({
            "status": "unhealthy",
            "error": e.to_string(),
        })),
    }
}
