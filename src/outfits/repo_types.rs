use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

/// Row of `outfit_uploads`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Outfit {
    pub id: i64,
    pub user_id: Option<i64>,
    pub image_path: String, // "/images/<file>"
    pub score: f64,
    pub feedback: String, // serialized JSON
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Outfit {
    /// File name component of `image_path`.
    pub fn file_name(&self) -> &str {
        file_name_of(&self.image_path)
    }
}

pub fn file_name_of(image_path: &str) -> &str {
    image_path
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(image_path)
}

#[derive(Debug, Clone, Copy)]
pub struct NewOutfit<'a> {
    pub user_id: i64,
    pub image_path: &'a str,
    pub score: f64,
    pub feedback: &'a str,
}
