use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

use crate::analysis::AnalysisError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("No token provided")]
    Unauthenticated,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Access denied")]
    Forbidden,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Error from AI model")]
    AnalysisUnavailable(String),

    #[error("The AI response could not be parsed into the expected format")]
    MalformedAnalysis { raw: String, details: String },

    #[error("Server error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn user_not_found() -> Self {
        AppError::NotFound("User not found".into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated | AppError::InvalidToken | AppError::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::AnalysisUnavailable(_)
            | AppError::MalformedAnalysis { .. }
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(anyhow::Error::new(err).context("database error"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(anyhow::Error::new(err).context("filesystem error"))
    }
}

impl From<AnalysisError> for AppError {
    fn from(err: AnalysisError) -> Self {
        match err {
            AnalysisError::Unavailable(details) => AppError::AnalysisUnavailable(details),
            AnalysisError::Malformed { raw, reason } => AppError::MalformedAnalysis {
                raw,
                details: reason,
            },
        }
    }
}

/// Whether internal error details are exposed in responses. Set once at startup.
static EXPOSE_DETAILS: AtomicBool = AtomicBool::new(true);

pub fn expose_internal_details(expose: bool) {
    EXPOSE_DETAILS.store(expose, Ordering::Relaxed);
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        let body = match self {
            AppError::AnalysisUnavailable(details) => {
                tracing::error!(%details, "analysis gateway failed");
                json!({ "error": message, "message": message, "details": details })
            }
            AppError::MalformedAnalysis { raw, details } => {
                tracing::error!(%details, "analysis response rejected");
                json!({ "error": message, "message": message, "details": details, "raw": raw })
            }
            AppError::Internal(err) => {
                tracing::error!(error = ?err, "request failed");
                if EXPOSE_DETAILS.load(Ordering::Relaxed) {
                    json!({ "error": message, "message": message, "details": format!("{err:#}") })
                } else {
                    json!({ "error": message, "message": message })
                }
            }
            _ => json!({ "error": message, "message": message }),
        };

        (status, Json(body)).into_response()
    }
}
