use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failures raised by the coding-session core and its collaborators.
///
/// Inside the realtime channel these never escape a message handler: they are
/// turned into `error`, `run_result` or `submit_result` events. Over HTTP they
/// convert into `AppError`.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A remote dependency (judge, LLM, STT, database) was unreachable,
    /// timed out, or answered with a non-success status.
    #[error("{service} error: {message}")]
    Dependency {
        service: &'static str,
        message: String,
    },

    /// A dependency answered successfully but with an unexpected shape.
    #[error("Unexpected response from {service}: {message}")]
    Protocol {
        service: &'static str,
        message: String,
    },

    #[error("{0} not found")]
    NotFound(String),

    #[error("Unsupported language: {language}. Supported: {supported}")]
    UnsupportedLanguage { language: String, supported: String },

    /// Polling spent its whole attempt budget without a terminal status.
    #[error("Execution timeout")]
    Timeout { attempts: u32 },

    /// An inbound realtime payload could not be understood.
    #[error("{0}")]
    MalformedMessage(String),
}

impl CoreError {
    pub fn dependency(service: &'static str, message: impl Into<String>) -> Self {
        CoreError::Dependency {
            service,
            message: message.into(),
        }
    }

    pub fn protocol(service: &'static str, message: impl Into<String>) -> Self {
        CoreError::Protocol {
            service,
            message: message.into(),
        }
    }
}

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match &err {
            CoreError::NotFound(what) => AppError::NotFound(format!("{what} not found")),
            CoreError::UnsupportedLanguage { .. } | CoreError::MalformedMessage(_) => {
                AppError::Validation(err.to_string())
            }
            CoreError::Dependency { .. } | CoreError::Protocol { .. } | CoreError::Timeout { .. } => {
                AppError::Upstream(err.to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Upstream(msg) => {
                tracing::error!("Upstream error: {msg}");
                (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", msg.clone())
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
