//! Per-session REST endpoints around the live coding channel.

use std::collections::BTreeSet;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::coding::snapshots::CodeSnapshot;
use crate::errors::AppError;
use crate::models::proctor::{NewProctorEvent, ProctorEventRow};
use crate::models::task::{CodingTask, NewCodingTask};
use crate::state::AppState;

#[derive(Debug, Serialize, PartialEq)]
pub struct ProctorSummary {
    pub total_events: usize,
    pub high_severity_events: usize,
    pub event_types: Vec<String>,
}

pub fn summarize_proctor_events(events: &[ProctorEventRow]) -> ProctorSummary {
    let event_types: BTreeSet<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
    ProctorSummary {
        total_events: events.len(),
        high_severity_events: events.iter().filter(|e| e.severity == "high").count(),
        event_types: event_types.into_iter().map(str::to_string).collect(),
    }
}

/// POST /session/:session_id/tasks
pub async fn handle_create_task(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<NewCodingTask>,
) -> Result<(StatusCode, Json<CodingTask>), AppError> {
    if request.title.trim().is_empty() {
        return Err(AppError::Validation("title cannot be empty".to_string()));
    }

    let task = request.into_task(&session_id);
    state.store.insert_task(&task).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// GET /session/:session_id/snapshots
///
/// Autosave history, oldest first, for resuming after a disconnect.
pub async fn handle_snapshots(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Json<Vec<CodeSnapshot>> {
    Json(state.snapshots.history(&session_id).await)
}

/// POST /session/:session_id/proctor
pub async fn handle_log_proctor_event(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(event): Json<NewProctorEvent>,
) -> Result<Json<Value>, AppError> {
    if event.event_type.trim().is_empty() {
        return Err(AppError::Validation("event_type cannot be empty".to_string()));
    }

    state.store.record_proctor_event(&session_id, &event).await?;
    Ok(Json(json!({ "message": "Event logged successfully" })))
}

/// GET /session/:session_id/proctor
pub async fn handle_proctor_summary(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ProctorSummary>, AppError> {
    let events = state.store.proctor_events(&session_id).await?;
    Ok(Json(summarize_proctor_events(&events)))
}
