use sqlx::MySqlPool;
use time::OffsetDateTime;

/// Outcome of a committed account deletion.
#[derive(Debug, Clone, PartialEq)]
pub struct DeletedAccount {
    pub archive_id: i64,
    pub outfit_count: i64,
    /// Image paths of the outfits removed by the cascade; their files are still on disk.
    pub image_paths: Vec<String>,
}

#[derive(sqlx::FromRow)]
struct UserSummary {
    email: String,
    name: Option<String>,
    created_at: OffsetDateTime,
}

/// Archives the account summary and deletes the user in one transaction.
///
/// Returns `Ok(None)` when the user no longer exists. Any error drops the
/// transaction, which rolls back both the archive insert and the delete.
pub async fn delete_account(
    db: &MySqlPool,
    user_id: i64,
    reason: &str,
) -> sqlx::Result<Option<DeletedAccount>> {
    let mut tx = db.begin().await?;

    let Some(user) = sqlx::query_as::<_, UserSummary>(
        "SELECT email, name, created_at FROM users WHERE id = ? FOR UPDATE",
    )
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?
    else {
        return Ok(None);
    };

    let image_paths = sqlx::query_scalar::<_, String>(
        "SELECT image_path FROM outfit_uploads WHERE user_id = ? FOR UPDATE",
    )
    .bind(user_id)
    .fetch_all(&mut *tx)
    .await?;
    let outfit_count = image_paths.len() as i64;

    let archive_id = sqlx::query(
        r#"
        INSERT INTO deleted_accounts_data
            (email, name, account_created_at, outfit_count, deletion_reason)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.email)
    .bind(&user.name)
    .bind(user.created_at)
    .bind(outfit_count)
    .bind(reason)
    .execute(&mut *tx)
    .await?
    .last_insert_id() as i64;

    // outfit_uploads rows go with it via ON DELETE CASCADE
    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(Some(DeletedAccount {
        archive_id,
        outfit_count,
        image_paths,
    }))
}
