use axum::{extract::State, routing::delete, Json, Router};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::{
    auth::AuthUser, error::AppError, images::services::remove_image_best_effort,
    state::AppState,
};

pub const MAX_REASON_CHARS: usize = 255;

pub fn account_routes() -> Router<AppState> {
    Router::new().route("/users/account", delete(delete_account))
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteAccountRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

impl DeleteAccountRequest {
    /// An empty body means no reason. Anything else must be a valid request object.
    fn from_body(body: &[u8]) -> Result<Self, AppError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
            .map_err(|e| AppError::Validation(format!("Invalid request body: {e}")))
    }
}

#[derive(Serialize)]
pub struct DeleteAccountResponse {
    pub message: &'static str,
}

/// Archives a summary of the account, then removes the user and every outfit.
///
/// Image files are removed only after the transaction commits; a file that
/// cannot be removed is logged and left behind.
#[instrument(skip_all)]
pub async fn delete_account(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    body: Bytes,
) -> Result<Json<DeleteAccountResponse>, AppError> {
    let reason = DeleteAccountRequest::from_body(&body)?
        .reason
        .map(|r| r.trim().to_string())
        .unwrap_or_default();
    if reason.chars().count() > MAX_REASON_CHARS {
        return Err(AppError::Validation(format!(
            "Reason must be at most {MAX_REASON_CHARS} characters"
        )));
    }

    let deleted = state.store.delete_account(user.id, &reason).await?;
    for path in &deleted.image_paths {
        remove_image_best_effort(state.storage.as_ref(), path).await;
    }

    info!(
        user_id = user.id,
        archive_id = deleted.archive_id,
        outfits = deleted.outfit_count,
        "account deleted"
    );
    Ok(Json(DeleteAccountResponse {
        message: "Account deleted successfully",
    }))
}
