use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Common error types used across the application.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid network: {0}")]
    InvalidNetwork(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("RPC unreachable: {0}")]
    RpcUnreachable(String),

    #[error("Contract call failed: {0}")]
    ContractCall(String),

    #[error("Oracle read error: {0}")]
    OracleRead(String),

    #[error("Contract not available: {0}")]
    MissingContract(String),

    #[error("ABI error: {0}")]
    Abi(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::InvalidAddress(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidNetwork(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::RpcUnreachable(_) => StatusCode::BAD_GATEWAY,
            AppError::ContractCall(_) => StatusCode::BAD_GATEWAY,
            AppError::OracleRead(_) => StatusCode::BAD_GATEWAY,
            AppError::MissingContract(_) => StatusCode::NOT_FOUND,
            AppError::Abi(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}
