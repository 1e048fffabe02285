use serde::Serialize;

use super::repo_types::Outfit;

#[derive(Serialize)]
pub struct OutfitsResponse {
    pub outfits: Vec<Outfit>,
}

#[derive(Serialize)]
pub struct UploadCountResponse {
    pub count: i64,
}
