use axum::{Router, http::HeaderMap};

use crate::{error::AppError, state::SharedState};

pub mod docs;
pub mod health;
pub mod predictions;
pub mod scoring;

/// Header carrying the caller's identity, normally injected by the gateway.
const USER_ID_HEADER: &str = "x-user-id";

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(predictions::router())
        .merge(scoring::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}

/// Caller identity from the [`USER_ID_HEADER`] header, `None` when the header
/// is missing or blank.
pub(crate) fn user_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

/// Caller identity for endpoints that refuse anonymous access.
pub(crate) fn require_user(headers: &HeaderMap) -> Result<String, AppError> {
    user_from_headers(headers)
        .ok_or_else(|| AppError::Unauthorized("missing user identity header `X-User-Id`".into()))
}
