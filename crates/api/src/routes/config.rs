//! Configuration routes.
//!
//! Writes validate addresses with the mode from `ADDRESS_VALIDATION`
//! (strict by default: one bad address rejects the whole request with 400).

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use caucion_common::error::AppError;
use caucion_common::store::{ConfigRecord, ConfigUpdate};

use crate::middleware::auth::AdminGuard;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/config",
        get(get_config).put(set_config).post(set_config),
    )
}

/// GET /config: current record, public.
async fn get_config(State(state): State<AppState>) -> Json<ConfigRecord> {
    Json(state.store.load().await)
}

/// PUT /config: merge a partial record and persist it.
async fn set_config(
    State(state): State<AppState>,
    admin: AdminGuard,
    Json(update): Json<ConfigUpdate>,
) -> Result<Json<ConfigRecord>, AppError> {
    let saved = state
        .store
        .save(&update, state.config.validation_mode)
        .await?;

    tracing::info!(
        authenticated = admin.authenticated,
        network = %saved.network,
        mode = %state.config.validation_mode,
        "Configuration updated"
    );

    Ok(Json(saved))
}
