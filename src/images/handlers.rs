use axum::{
    extract::{Path, State},
    http::header::{CACHE_CONTROL, CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tracing::{instrument, warn};

use super::services::content_type_for;
use crate::{auth::AuthUser, error::AppError, state::AppState};

pub fn image_routes() -> Router<AppState> {
    Router::new().route("/images/:image_name", get(serve_image))
}

/// Streams an image only to the user whose outfit references it.
///
/// A name the caller does not own is `Forbidden` whether or not the file
/// exists, so other users' files cannot be probed.
#[instrument(skip_all)]
pub async fn serve_image(
    State(state): State<AppState>,
    user: AuthUser,
    Path(image_name): Path<String>,
) -> Result<Response, AppError> {
    let AuthUser(user) = user;
    let outfits = state.store.list_outfits(user.id).await?;
    if !outfits.iter().any(|o| o.file_name() == image_name) {
        warn!(user_id = user.id, %image_name, "image not owned by caller");
        return Err(AppError::Forbidden);
    }

    let Some(bytes) = state.storage.read_image(&image_name).await? else {
        warn!(%image_name, "owned image missing on disk");
        return Err(AppError::NotFound("Image not found".into()));
    };

    Ok((
        [
            (CONTENT_TYPE, content_type_for(&image_name)),
            (CACHE_CONTROL, "private, max-age=3600"),
        ],
        bytes,
    )
        .into_response())
}
