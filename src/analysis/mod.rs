use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod gateway;
pub mod handlers;
pub mod parse;

pub use dto::{Analysis, CategoryScores};
pub use gateway::{AnalysisClient, GeminiClient};

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// Gateway missing, unreachable, or returned an error.
    #[error("analysis unavailable: {0}")]
    Unavailable(String),

    #[error("malformed analysis response: {reason}")]
    Malformed { raw: String, reason: String },
}

/// Asks the model to critique one outfit image and validates the answer.
pub async fn analyze_outfit(
    client: Option<&dyn AnalysisClient>,
    image: &[u8],
    mime_type: &str,
) -> Result<Analysis, AnalysisError> {
    let client =
        client.ok_or_else(|| AnalysisError::Unavailable("AI service not initialized".into()))?;
    let text = client
        .generate(gateway::OUTFIT_PROMPT, image, mime_type)
        .await?;
    parse::parse_analysis(&text)
}

pub fn router() -> Router<AppState> {
    handlers::analysis_routes()
}
