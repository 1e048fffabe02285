use anyhow::Context;
use async_trait::async_trait;
use sqlx::{
    mysql::{MySqlConnectOptions, MySqlPoolOptions},
    MySqlPool,
};

use crate::{
    accounts::repo::{self as accounts_repo, DeletedAccount},
    auth::User,
    config::DatabaseConfig,
    error::AppError,
    outfits::{
        repo as outfits_repo,
        repo_types::{NewOutfit, Outfit},
    },
};

#[cfg(test)]
pub mod memory;

/// Persistence used by the handlers: users, outfit records and the deletion archive.
#[async_trait]
pub trait Store: Send + Sync {
    /// Fails with `Conflict` when the email is taken.
    async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        name: Option<&str>,
    ) -> Result<User, AppError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    async fn find_user(&self, id: i64) -> Result<Option<User>, AppError>;

    async fn insert_outfit(&self, new: NewOutfit<'_>) -> Result<Outfit, AppError>;
    /// Newest first.
    async fn list_outfits(&self, user_id: i64) -> Result<Vec<Outfit>, AppError>;
    async fn count_outfits(&self, user_id: i64) -> Result<i64, AppError>;
    async fn find_outfit(&self, id: i64, user_id: i64) -> Result<Option<Outfit>, AppError>;
    async fn delete_outfit(&self, id: i64, user_id: i64) -> Result<Option<Outfit>, AppError>;

    /// Archive-then-delete as one atomic unit. Fails with `NotFound` for a missing user.
    async fn delete_account(&self, user_id: i64, reason: &str) -> Result<DeletedAccount, AppError>;
}

#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub async fn connect(cfg: &DatabaseConfig) -> anyhow::Result<Self> {
        let options = MySqlConnectOptions::new()
            .host(&cfg.host)
            .port(cfg.port)
            .username(&cfg.user)
            .password(&cfg.password)
            .database(&cfg.name);
        let pool = MySqlPoolOptions::new()
            .max_connections(cfg.max_connections)
            .connect_with(options)
            .await
            .context("connect to database")?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl Store for MySqlStore {
    async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        name: Option<&str>,
    ) -> Result<User, AppError> {
        User::create(&self.pool, email, password_hash, name)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::Conflict("Email is already registered".into())
                } else {
                    e.into()
                }
            })
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(User::find_by_email(&self.pool, email).await?)
    }

    async fn find_user(&self, id: i64) -> Result<Option<User>, AppError> {
        Ok(User::find_by_id(&self.pool, id).await?)
    }

    async fn insert_outfit(&self, new: NewOutfit<'_>) -> Result<Outfit, AppError> {
        Ok(outfits_repo::insert(&self.pool, new).await?)
    }

    async fn list_outfits(&self, user_id: i64) -> Result<Vec<Outfit>, AppError> {
        Ok(outfits_repo::list_by_user(&self.pool, user_id).await?)
    }

    async fn count_outfits(&self, user_id: i64) -> Result<i64, AppError> {
        Ok(outfits_repo::count_by_user(&self.pool, user_id).await?)
    }

    async fn find_outfit(&self, id: i64, user_id: i64) -> Result<Option<Outfit>, AppError> {
        Ok(outfits_repo::find_for_user(&self.pool, id, user_id).await?)
    }

    async fn delete_outfit(&self, id: i64, user_id: i64) -> Result<Option<Outfit>, AppError> {
        Ok(outfits_repo::delete_for_user(&self.pool, id, user_id).await?)
    }

    async fn delete_account(&self, user_id: i64, reason: &str) -> Result<DeletedAccount, AppError> {
        accounts_repo::delete_account(&self.pool, user_id, reason)
            .await?
            .ok_or_else(AppError::user_not_found)
    }
}
