pub mod dto;
pub mod handlers;
pub mod repo_types;
pub mod runner;
pub mod services;
pub mod timer;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::router()
}
