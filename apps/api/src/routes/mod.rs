pub mod ai;
pub mod health;
pub mod judge;
pub mod sessions;

use axum::{
    routing::{get, post},
    Router,
};

use crate::coding::ws::coding_ws_handler;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Realtime coding channel
        .route(
            "/ws/session/:session_id/coding/:task_id",
            get(coding_ws_handler),
        )
        // Code execution
        .route("/judge/submit", post(judge::handle_submit))
        .route("/judge/result/:token", get(judge::handle_result))
        .route("/judge/run_tests/:task_id", post(judge::handle_run_tests))
        .route("/judge/languages", get(judge::handle_languages))
        .route("/judge/health", get(judge::handle_health))
        // Session resources
        .route("/session/:session_id/tasks", post(sessions::handle_create_task))
        .route("/session/:session_id/snapshots", get(sessions::handle_snapshots))
        .route(
            "/session/:session_id/proctor",
            get(sessions::handle_proctor_summary).post(sessions::handle_log_proctor_event),
        )
        // Collaborators
        .route("/stt/transcribe", post(ai::handle_transcribe))
        .route("/llm/generate", post(ai::handle_generate))
        .with_state(state)
}
