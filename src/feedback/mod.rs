pub mod dto;
pub mod handlers;
pub mod lifecycle;
mod repo;
pub mod repo_types;
pub mod services;
pub mod stats;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::feedback_routes())
        .merge(handlers::admin_routes())
}
