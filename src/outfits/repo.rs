use sqlx::MySqlPool;

use super::repo_types::{NewOutfit, Outfit};

const OUTFIT_COLUMNS: &str = "id, user_id, image_path, score, feedback, created_at";

pub async fn insert(db: &MySqlPool, new: NewOutfit<'_>) -> sqlx::Result<Outfit> {
    let id = sqlx::query(
        r#"
        INSERT INTO outfit_uploads (user_id, image_path, score, feedback)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(new.user_id)
    .bind(new.image_path)
    .bind(new.score)
    .bind(new.feedback)
    .execute(db)
    .await?
    .last_insert_id() as i64;

    find_for_user(db, id, new.user_id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)
}

pub async fn list_by_user(db: &MySqlPool, user_id: i64) -> sqlx::Result<Vec<Outfit>> {
    sqlx::query_as::<_, Outfit>(&format!(
        "SELECT {OUTFIT_COLUMNS} FROM outfit_uploads WHERE user_id = ? ORDER BY created_at DESC, id DESC"
    ))
    .bind(user_id)
    .fetch_all(db)
    .await
}

pub async fn count_by_user(db: &MySqlPool, user_id: i64) -> sqlx::Result<i64> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM outfit_uploads WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(db)
        .await
}

/// Only returns the outfit when it belongs to `user_id`.
pub async fn find_for_user(
    db: &MySqlPool,
    outfit_id: i64,
    user_id: i64,
) -> sqlx::Result<Option<Outfit>> {
    sqlx::query_as::<_, Outfit>(&format!(
        "SELECT {OUTFIT_COLUMNS} FROM outfit_uploads WHERE id = ? AND user_id = ?"
    ))
    .bind(outfit_id)
    .bind(user_id)
    .fetch_optional(db)
    .await
}

/// Deletes an owned outfit and returns the removed row.
pub async fn delete_for_user(
    db: &MySqlPool,
    outfit_id: i64,
    user_id: i64,
) -> sqlx::Result<Option<Outfit>> {
    let mut tx = db.begin().await?;

    let outfit = sqlx::query_as::<_, Outfit>(&format!(
        "SELECT {OUTFIT_COLUMNS} FROM outfit_uploads WHERE id = ? AND user_id = ? FOR UPDATE"
    ))
    .bind(outfit_id)
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?;

    if outfit.is_some() {
        sqlx::query("DELETE FROM outfit_uploads WHERE id = ? AND user_id = ?")
            .bind(outfit_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(outfit)
}
