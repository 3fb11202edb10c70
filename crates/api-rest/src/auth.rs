use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

use crate::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Validates the provided API key against the key the service was started with.
///
/// Returns `Ok(())` if the key matches, or `401 Unauthorized` if it is missing or wrong.
pub fn validate_api_key(
    provided_key: Option<&str>,
    expected_key: &str,
) -> Result<(), (StatusCode, &'static str)> {
    match provided_key {
        Some(key) if !expected_key.is_empty() && key == expected_key => Ok(()),
        _ => Err((StatusCode::UNAUTHORIZED, "Invalid API key")),
    }
}

/// Route layer rejecting requests without a valid `x-api-key` header.
pub async fn require_api_key(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    let provided = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());
    validate_api_key(provided, &state.api_key)?;
    Ok(next.run(req).await)
}
