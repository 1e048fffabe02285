use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod handlers;
pub mod legacy;

pub use legacy::LegacyHistory;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::legacy_routes())
        .merge(handlers::user_routes())
}
