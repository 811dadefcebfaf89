//! Thin HTTP access to the speech-to-text and text generation collaborators.

use axum::{
    body::Bytes,
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, CoreError};
use crate::llm_client::GenerationParams;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TranscribeQuery {
    #[serde(default = "default_filename")]
    pub filename: String,
}

fn default_filename() -> String {
    "answer.wav".to_string()
}

#[derive(Debug, Serialize)]
pub struct TranscribeResponse {
    pub transcript: String,
    pub engine: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub text: String,
    pub engine: &'static str,
}

/// POST /stt/transcribe?filename=
/// Body is the raw audio file.
pub async fn handle_transcribe(
    State(state): State<AppState>,
    Query(query): Query<TranscribeQuery>,
    audio: Bytes,
) -> Result<Json<TranscribeResponse>, AppError> {
    if audio.is_empty() {
        return Err(AppError::Validation("audio body cannot be empty".to_string()));
    }

    let transcript = state.transcriber.transcribe(audio, &query.filename).await?;
    Ok(Json(TranscribeResponse {
        transcript,
        engine: state.transcriber.engine(),
    }))
}

/// POST /llm/generate
pub async fn handle_generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, AppError> {
    if request.prompt.trim().is_empty() {
        return Err(AppError::Validation("prompt cannot be empty".to_string()));
    }

    let defaults = GenerationParams::default();
    let params = GenerationParams {
        max_tokens: request.max_tokens.unwrap_or(defaults.max_tokens),
        temperature: request.temperature.unwrap_or(defaults.temperature),
    };

    let text = state
        .generator
        .generate(&request.prompt, params)
        .await
        .map_err(CoreError::from)?;

    Ok(Json(GenerateResponse {
        text,
        engine: state.generator.engine(),
    }))
}
