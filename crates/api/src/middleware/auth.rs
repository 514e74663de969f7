//! Static admin-token gate for configuration writes.
//!
//! When `ADMIN_TOKEN` is set, protected routes require either
//! `Authorization: Bearer <token>` or `X-Admin-Token: <token>`. When it is
//! unset the gate lets every request through.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;

use caucion_common::error::AppError;

use crate::state::AppState;

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Proof that the request passed the admin-token check.
///
/// Use as an Axum extractor on write routes:
/// ```ignore
/// async fn handler(_admin: AdminGuard, Json(body): Json<Body>) -> impl IntoResponse {
///     // only reached when the token matched or none is configured
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct AdminGuard {
    /// False when no admin token is configured and the route is open.
    pub authenticated: bool,
}

/// Check `headers` against the configured token.
pub fn check_admin(headers: &HeaderMap, expected: Option<&str>) -> Result<AdminGuard, AppError> {
    let Some(expected) = expected.filter(|t| !t.is_empty()) else {
        return Ok(AdminGuard {
            authenticated: false,
        });
    };

    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            let (scheme, token) = v.trim().split_once(' ')?;
            scheme.eq_ignore_ascii_case("bearer").then(|| token.trim())
        });
    let header = headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim);

    if [bearer, header]
        .into_iter()
        .flatten()
        .any(|candidate| constant_time_eq(candidate.as_bytes(), expected.as_bytes()))
    {
        return Ok(AdminGuard {
            authenticated: true,
        });
    }

    tracing::warn!(
        has_bearer = bearer.is_some(),
        has_header = header.is_some(),
        "Rejected admin request"
    );
    Err(AppError::Unauthorized)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

impl FromRequestParts<AppState> for AdminGuard {
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let result = check_admin(&parts.headers, state.config.admin_token.as_deref());
        async move { result }
    }
}
