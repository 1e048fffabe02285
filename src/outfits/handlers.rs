use axum::{extract::State, routing::get, Json, Router};

use super::dto::{OutfitsResponse, UploadCountResponse};
use crate::{auth::AuthUser, error::AppError, state::AppState};

pub fn outfit_routes() -> Router<AppState> {
    Router::new()
        .route("/users/outfits", get(list_outfits))
        .route("/users/upload-count", get(upload_count))
}

/// Raw outfit rows of the caller, newest first.
pub async fn list_outfits(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<OutfitsResponse>, AppError> {
    let outfits = state.store.list_outfits(user.id).await?;
    Ok(Json(OutfitsResponse { outfits }))
}

pub async fn upload_count(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<UploadCountResponse>, AppError> {
    let count = state.store.count_outfits(user.id).await?;
    Ok(Json(UploadCountResponse { count }))
}
