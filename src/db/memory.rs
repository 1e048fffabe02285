use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex,
};

use async_trait::async_trait;
use time::OffsetDateTime;

use super::Store;
use crate::{
    accounts::repo::DeletedAccount,
    auth::User,
    error::AppError,
    outfits::repo_types::{NewOutfit, Outfit},
};

#[derive(Debug, Clone)]
pub struct ArchiveRow {
    pub email: String,
    pub name: Option<String>,
    pub account_created_at: OffsetDateTime,
    pub outfit_count: i64,
    pub reason: String,
}

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    outfits: Vec<Outfit>,
    archive: Vec<ArchiveRow>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// `Store` over plain vectors behind one lock; every call is its own transaction.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_archive_insert: AtomicBool,
}

impl MemoryStore {
    /// Makes the next account deletion fail at the archive step.
    pub fn fail_next_archive_insert(&self) {
        self.fail_archive_insert.store(true, Ordering::SeqCst);
    }

    pub fn user_count(&self) -> usize {
        self.tables.lock().unwrap().users.len()
    }

    pub fn outfit_count(&self) -> usize {
        self.tables.lock().unwrap().outfits.len()
    }

    pub fn archive(&self) -> Vec<ArchiveRow> {
        self.tables.lock().unwrap().archive.clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        name: Option<&str>,
    ) -> Result<User, AppError> {
        let mut t = self.tables.lock().unwrap();
        if t.users.iter().any(|u| u.email == email) {
            return Err(AppError::Conflict("Email is already registered".into()));
        }
        let user = User {
            id: t.next_id(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            name: name.map(str::to_string),
            created_at: OffsetDateTime::now_utc(),
        };
        t.users.push(user.clone());
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let t = self.tables.lock().unwrap();
        Ok(t.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user(&self, id: i64) -> Result<Option<User>, AppError> {
        let t = self.tables.lock().unwrap();
        Ok(t.users.iter().find(|u| u.id == id).cloned())
    }

    async fn insert_outfit(&self, new: NewOutfit<'_>) -> Result<Outfit, AppError> {
        let mut t = self.tables.lock().unwrap();
        let outfit = Outfit {
            id: t.next_id(),
            user_id: Some(new.user_id),
            image_path: new.image_path.to_string(),
            score: new.score,
            feedback: new.feedback.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        t.outfits.push(outfit.clone());
        Ok(outfit)
    }

    async fn list_outfits(&self, user_id: i64) -> Result<Vec<Outfit>, AppError> {
        let t = self.tables.lock().unwrap();
        let mut rows: Vec<Outfit> = t
            .outfits
            .iter()
            .filter(|o| o.user_id == Some(user_id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn count_outfits(&self, user_id: i64) -> Result<i64, AppError> {
        let t = self.tables.lock().unwrap();
        Ok(t.outfits.iter().filter(|o| o.user_id == Some(user_id)).count() as i64)
    }

    async fn find_outfit(&self, id: i64, user_id: i64) -> Result<Option<Outfit>, AppError> {
        let t = self.tables.lock().unwrap();
        Ok(t
            .outfits
            .iter()
            .find(|o| o.id == id && o.user_id == Some(user_id))
            .cloned())
    }

    async fn delete_outfit(&self, id: i64, user_id: i64) -> Result<Option<Outfit>, AppError> {
        let mut t = self.tables.lock().unwrap();
        let pos = t
            .outfits
            .iter()
            .position(|o| o.id == id && o.user_id == Some(user_id));
        Ok(pos.map(|i| t.outfits.remove(i)))
    }

    async fn delete_account(&self, user_id: i64, reason: &str) -> Result<DeletedAccount, AppError> {
        let mut t = self.tables.lock().unwrap();
        let user = t
            .users
            .iter()
            .find(|u| u.id == user_id)
            .cloned()
            .ok_or_else(AppError::user_not_found)?;

        let image_paths: Vec<String> = t
            .outfits
            .iter()
            .filter(|o| o.user_id == Some(user_id))
            .map(|o| o.image_path.clone())
            .collect();
        let outfit_count = image_paths.len() as i64;

        // nothing has been written yet, so bailing out here is a full rollback
        if self.fail_archive_insert.swap(false, Ordering::SeqCst) {
            return Err(anyhow::anyhow!("archive insert failed").into());
        }

        t.archive.push(ArchiveRow {
            email: user.email,
            name: user.name,
            account_created_at: user.created_at,
            outfit_count,
            reason: reason.to_string(),
        });
        let archive_id = t.archive.len() as i64;
        t.users.retain(|u| u.id != user_id);
        t.outfits.retain(|o| o.user_id != Some(user_id));

        Ok(DeletedAccount {
            archive_id,
            outfit_count,
            image_paths,
        })
    }
}
