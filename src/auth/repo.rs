use crate::auth::repo_types::User;
use sqlx::MySqlPool;

impl User {
    /// Find a user by email.
    pub async fn find_by_email(db: &MySqlPool, email: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password, name, created_at
            FROM users
            WHERE email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await
    }

    /// Find a user by ID.
    pub async fn find_by_id(db: &MySqlPool, id: i64) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password, name, created_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
    }

    /// Create a new user with hashed password. Fails on a duplicate email.
    pub async fn create(
        db: &MySqlPool,
        email: &str,
        password_hash: &str,
        name: Option<&str>,
    ) -> sqlx::Result<User> {
        let id = sqlx::query("INSERT INTO users (email, password, name) VALUES (?, ?, ?)")
            .bind(email)
            .bind(password_hash)
            .bind(name)
            .execute(db)
            .await?
            .last_insert_id() as i64;

        // MySQL has no RETURNING
        Self::find_by_id(db, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }
}
