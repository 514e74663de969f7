pub mod addresses;
pub mod config;
pub mod contracts;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the complete API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(config::router())
        .merge(addresses::router())
        .merge(contracts::router())
        .with_state(state)
}
