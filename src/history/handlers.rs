use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tracing::{info, instrument};

use super::dto::HistoryEntry;
use crate::{
    auth::AuthUser, error::AppError, images::services::remove_image_best_effort,
    state::AppState,
};

#[derive(Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: &'static str,
}

fn entry_not_found() -> AppError {
    AppError::NotFound("History entry not found".into())
}

/// Anonymous history, backed by the legacy JSON file.
pub fn legacy_routes() -> Router<AppState> {
    Router::new()
        .route("/history", get(list_legacy))
        .route("/history/:id", get(get_legacy).delete(delete_legacy))
}

/// Per-user history, backed by `outfit_uploads`.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/user-history", get(list_user))
        .route("/user-history/:id", get(get_user).delete(delete_user))
}

pub async fn list_legacy(State(state): State<AppState>) -> Result<Json<Vec<HistoryEntry>>, AppError> {
    Ok(Json(state.legacy_history.list().await?))
}

pub async fn get_legacy(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<HistoryEntry>, AppError> {
    state
        .legacy_history
        .get(&id)
        .await?
        .map(Json)
        .ok_or_else(entry_not_found)
}

#[instrument(skip_all)]
pub async fn delete_legacy(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    let removed = state
        .legacy_history
        .remove(&id)
        .await?
        .ok_or_else(entry_not_found)?;
    remove_image_best_effort(state.storage.as_ref(), &removed.image_path).await;
    info!(%id, "legacy history entry deleted");
    Ok(Json(DeleteResponse {
        success: true,
        message: "History entry deleted successfully",
    }))
}

pub async fn list_user(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<HistoryEntry>>, AppError> {
    let outfits = state.store.list_outfits(user.id).await?;
    Ok(Json(outfits.iter().map(HistoryEntry::from_outfit).collect()))
}

/// Non-numeric ids can never match a row.
fn parse_outfit_id(raw: &str) -> Result<i64, AppError> {
    raw.parse().map_err(|_| entry_not_found())
}

pub async fn get_user(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<HistoryEntry>, AppError> {
    let id = parse_outfit_id(&id)?;
    let outfit = state
        .store
        .find_outfit(id, user.id)
        .await?
        .ok_or_else(entry_not_found)?;
    Ok(Json(HistoryEntry::from_outfit(&outfit)))
}

#[instrument(skip_all)]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    let id = parse_outfit_id(&id)?;
    let outfit = state
        .store
        .delete_outfit(id, user.id)
        .await?
        .ok_or_else(entry_not_found)?;
    remove_image_best_effort(state.storage.as_ref(), &outfit.image_path).await;
    info!(user_id = user.id, outfit_id = id, "outfit deleted");
    Ok(Json(DeleteResponse {
        success: true,
        message: "History entry deleted successfully",
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::state::test_support::TestApp;

    #[tokio::test]
    async fn user_history_is_scoped_to_the_caller() {
        let app = TestApp::new();
        let alice = app.seed_user("alice@example.com").await;
        let bob = app.seed_user("bob@example.com").await;
        app.write_image("a1.jpg", b"1");
        let outfit = app.seed_outfit(alice.id, "/images/a1.jpg").await;
        let bob_token = app.token_for(bob.id);

        let (status, list) = app.get("/api/user-history", Some(&bob_token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list, serde_json::json!([]));

        let uri = format!("/api/user-history/{}", outfit.id);
        let (status, _) = app.get(&uri, Some(&bob_token)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = app.delete(&uri, Some(&bob_token)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(app.store.outfit_count(), 1);
        assert!(app.images_dir().join("a1.jpg").exists());

        let (status, list) = app.get("/api/user-history", Some(&app.token_for(alice.id))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list[0]["id"], outfit.id.to_string());
    }

    #[tokio::test]
    async fn user_history_lists_newest_first() {
        let app = TestApp::new();
        let user = app.seed_user("carol@example.com").await;
        let first = app.seed_outfit(user.id, "/images/1.jpg").await;
        let second = app.seed_outfit(user.id, "/images/2.jpg").await;

        let (_, list) = app.get("/api/user-history", Some(&app.token_for(user.id))).await;
        let ids: Vec<_> = list.as_array().unwrap().iter().map(|e| e["id"].clone()).collect();
        assert_eq!(ids, vec![second.id.to_string(), first.id.to_string()]);
    }

    #[tokio::test]
    async fn user_history_requires_auth_and_numeric_ids() {
        let app = TestApp::new();
        let (status, _) = app.get("/api/user-history", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let user = app.seed_user("dan@example.com").await;
        let (status, _) = app.get("/api/user-history/abc", Some(&app.token_for(user.id))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn legacy_delete_removes_entry_and_file() {
        let app = TestApp::new();
        let (status, body) = app.upload(None, "look.jpg", "image/jpeg", b"jpeg").await;
        assert_eq!(status, StatusCode::OK);
        let id = body["id"].as_str().unwrap().to_string();
        let file = body["imagePath"].as_str().unwrap().trim_start_matches("/images/").to_string();
        assert!(app.images_dir().join(&file).exists());

        let (status, entry) = app.get(&format!("/api/history/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(entry["score"], 7.5);

        let (status, body) = app.delete(&format!("/api/history/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert!(!app.images_dir().join(&file).exists());

        let (status, _) = app.delete(&format!("/api/history/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn legacy_delete_succeeds_when_file_is_already_gone() {
        let app = TestApp::new();
        let (_, body) = app.upload(None, "look.jpg", "image/jpeg", b"jpeg").await;
        let id = body["id"].as_str().unwrap().to_string();
        for f in std::fs::read_dir(app.images_dir()).unwrap() {
            std::fs::remove_file(f.unwrap().path()).unwrap();
        }

        let (status, _) = app.delete(&format!("/api/history/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        let (_, list) = app.get("/api/history", None).await;
        assert_eq!(list, serde_json::json!([]));
    }
}
