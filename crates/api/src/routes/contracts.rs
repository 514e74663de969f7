//! Contract read routes.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use caucion_chain::proxy::{PriceOutcome, StatusReport};
use caucion_common::error::AppError;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/status", get(status))
        .route("/price", get(price))
        .route("/oracle/price", get(price))
}

/// GET /status: loan state, falling back to the vault manager.
async fn status(State(state): State<AppState>) -> Result<Json<StatusReport>, AppError> {
    let report = state.proxy().await.status().await?;
    Ok(Json(report))
}

/// GET /price: latest oracle round.
async fn price(State(state): State<AppState>) -> Result<Json<PriceOutcome>, AppError> {
    let outcome = state.proxy().await.price().await?;
    Ok(Json(outcome))
}
