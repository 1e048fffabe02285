use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use serde::Serialize;
use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use super::{analyze_outfit, Analysis};
use crate::{
    auth::{MaybeUser, User},
    error::AppError,
    history::{dto::HistoryEntry, dto::StoredFeedback},
    images::services::{ext_from_mime, extension_of, image_url, mime_from_ext, remove_image_best_effort},
    outfits::repo_types::NewOutfit,
    state::AppState,
};

const IMAGE_FIELD: &str = "image";

pub fn analysis_routes() -> Router<AppState> {
    Router::new().route("/analyze-fashion", post(analyze_fashion))
}

/// Applies the configured upload cap to the analysis route.
pub fn upload_limit(max_bytes: usize) -> DefaultBodyLimit {
    DefaultBodyLimit::max(max_bytes)
}

#[derive(Debug)]
struct ImageUpload {
    body: Bytes,
    mime_type: String,
    ext: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    /// Outfit row id for signed-in callers, legacy history id otherwise.
    pub id: serde_json::Value,
    pub image_path: String,
    #[serde(flatten)]
    pub analysis: Analysis,
}

async fn read_image_field(multipart: &mut Multipart) -> Result<ImageUpload, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let declared = field.content_type().map(str::to_ascii_lowercase);
        let file_ext = field.file_name().and_then(extension_of);
        let mime_type = match declared {
            Some(ct) if ct.starts_with("image/") => ct,
            _ => file_ext
                .as_deref()
                .and_then(mime_from_ext)
                .map(str::to_string)
                .ok_or_else(|| AppError::Validation("Uploaded file must be an image".into()))?,
        };
        let ext = ext_from_mime(&mime_type)
            .map(str::to_string)
            .or(file_ext)
            .unwrap_or_else(|| "img".to_string());

        let body = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read upload: {e}")))?;
        if body.is_empty() {
            return Err(AppError::Validation("Uploaded file is empty".into()));
        }

        return Ok(ImageUpload {
            body,
            mime_type,
            ext,
        });
    }
    Err(AppError::Validation("No file uploaded".into()))
}

/// `POST /api/analyze-fashion`
///
/// The upload is staged, sent for analysis, and only moved into the image
/// store once a valid critique came back. Signed-in callers get an outfit
/// row; anonymous ones land in the legacy history file.
#[instrument(skip_all)]
pub async fn analyze_fashion(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    mut multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let upload = read_image_field(&mut multipart).await?;
    let staged = state.storage.stage_upload(upload.body.clone()).await?;

    let analysis =
        match analyze_outfit(state.analyzer.as_deref(), &upload.body, &upload.mime_type).await {
            Ok(a) => a,
            Err(e) => {
                staged.discard();
                return Err(e.into());
            }
        };

    let file_name = state.storage.persist_upload(staged, &upload.ext).await?;
    let image_path = image_url(&file_name);

    let id = match record(&state, user.as_ref(), &file_name, &image_path, &analysis).await {
        Ok(id) => id,
        Err(e) => {
            remove_image_best_effort(state.storage.as_ref(), &image_path).await;
            return Err(e);
        }
    };

    info!(
        user_id = user.as_ref().map(|u| u.id),
        score = analysis.score,
        %image_path,
        "outfit analyzed"
    );

    Ok(Json(AnalyzeResponse {
        id,
        image_path,
        analysis,
    }))
}

async fn record(
    state: &AppState,
    user: Option<&User>,
    file_name: &str,
    image_path: &str,
    analysis: &Analysis,
) -> Result<serde_json::Value, AppError> {
    match user {
        Some(user) => {
            let feedback = StoredFeedback::from_analysis(analysis).to_json()?;
            let outfit = state
                .store
                .insert_outfit(NewOutfit {
                    user_id: user.id,
                    image_path,
                    score: analysis.score,
                    feedback: &feedback,
                })
                .await?;
            Ok(outfit.id.into())
        }
        None => {
            let id = file_name
                .split_once('.')
                .map_or(file_name, |(stem, _)| stem)
                .to_string();
            let entry = HistoryEntry::from_analysis(
                id.clone(),
                OffsetDateTime::now_utc(),
                image_path.to_string(),
                analysis,
            );
            state.legacy_history.append(entry).await.map_err(|e| {
                warn!(error = %e, "legacy history append failed");
                AppError::Internal(e)
            })?;
            Ok(id.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};

    use crate::state::test_support::{TestApp, GOOD_ANALYSIS};

    fn files_in(dir: &std::path::Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[tokio::test]
    async fn signed_in_upload_is_scored_recorded_and_retrievable() {
        let app = TestApp::new();
        let user = app.seed_user("alice@example.com").await;
        let token = app.token_for(user.id);

        let (status, body) = app
            .upload(Some(&token), "look.jpg", "image/jpeg", b"jpeg-bytes")
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["score"], 7.5);
        assert_eq!(body["categoryScores"]["style"], 8.0);
        assert_eq!(body["feedback"]["fit"], "Tailored");
        assert_eq!(body["recommendations"][0], "Add a belt");
        let image_path = body["imagePath"].as_str().unwrap().to_string();
        assert!(image_path.starts_with("/images/") && image_path.ends_with(".jpg"));

        // staged copy is gone, stored copy is present
        assert_eq!(files_in(&app.uploads_dir()), 0);
        assert_eq!(files_in(&app.images_dir()), 1);

        let id = body["id"].as_i64().unwrap();
        let (status, entry) = app.get(&format!("/api/user-history/{id}"), Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(entry["score"], 7.5);
        assert_eq!(entry["imagePath"], image_path.as_str());
        assert_eq!(entry["categoryScores"]["colorCoordination"], 7.0);

        let (status, _, bytes) = app.raw_get(&image_path, Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&bytes[..], b"jpeg-bytes");

        let (status, body) = app.delete(&format!("/api/user-history/{id}"), Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(app.store.outfit_count(), 0);
        assert_eq!(files_in(&app.images_dir()), 0);
    }

    #[tokio::test]
    async fn anonymous_upload_goes_to_legacy_history() {
        let app = TestApp::new();
        let (status, body) = app.upload(None, "look.png", "image/png", b"png").await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let id = body["id"].as_str().unwrap().to_string();
        assert!(body["imagePath"].as_str().unwrap().starts_with(&format!("/images/{id}")));
        assert_eq!(app.store.outfit_count(), 0);

        let (status, list) = app.get("/api/history", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list.as_array().unwrap().len(), 1);
        assert_eq!(list[0]["id"], id.as_str());
    }

    #[tokio::test]
    async fn missing_image_field_is_bad_request() {
        let app = TestApp::new();
        let (status, body) = app.json(Method::POST, "/api/analyze-fashion", None, serde_json::json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

        let (status, body) = app
            .upload_field(None, "photo", "look.jpg", "image/jpeg", b"jpeg")
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No file uploaded");
        assert_eq!(app.analyzer.calls(), 0);
    }

    #[tokio::test]
    async fn non_image_upload_is_rejected_before_analysis() {
        let app = TestApp::new();
        let (status, _) = app
            .upload(None, "notes.txt", "text/plain", b"hello")
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(app.analyzer.calls(), 0);
    }

    #[tokio::test]
    async fn malformed_model_output_persists_nothing() {
        let app = TestApp::new();
        app.analyzer.reply_with(Ok("Lovely outfit, 8/10".into()));
        let user = app.seed_user("bob@example.com").await;

        let (status, body) = app
            .upload(Some(&app.token_for(user.id)), "look.jpg", "image/jpeg", b"jpeg")
            .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body["error"],
            "The AI response could not be parsed into the expected format"
        );
        assert_eq!(body["raw"], "Lovely outfit, 8/10");
        assert_eq!(app.store.outfit_count(), 0);
        assert_eq!(files_in(&app.uploads_dir()), 0);
        assert_eq!(files_in(&app.images_dir()), 0);
    }

    #[tokio::test]
    async fn fenced_model_output_is_accepted() {
        let app = TestApp::new();
        app.analyzer
            .reply_with(Ok(format!("```json\n{GOOD_ANALYSIS}\n```")));
        let (status, body) = app.upload(None, "look.jpg", "image/jpeg", b"jpeg").await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["score"], 7.5);
    }

    #[tokio::test]
    async fn gateway_failure_is_server_error() {
        let app = TestApp::new();
        app.analyzer.reply_with(Err("quota exceeded".into()));
        let (status, body) = app.upload(None, "look.jpg", "image/jpeg", b"jpeg").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Error from AI model");
        assert_eq!(body["details"], "quota exceeded");
        assert_eq!(files_in(&app.uploads_dir()), 0);
        assert_eq!(files_in(&app.images_dir()), 0);
    }

    #[tokio::test]
    async fn unconfigured_gateway_is_server_error() {
        let app = TestApp::without_analyzer();
        let (status, body) = app.upload(None, "look.jpg", "image/jpeg", b"jpeg").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["details"], "AI service not initialized");
    }

    #[tokio::test]
    async fn bad_token_on_upload_is_treated_as_anonymous() {
        let app = TestApp::new();
        let (status, body) = app
            .upload(Some("not-a-token"), "look.jpg", "image/jpeg", b"jpeg")
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["id"].is_string());
        assert_eq!(app.store.outfit_count(), 0);
    }
}
