//! Admin check for the trigger routes.
//!
//! Runs before any streaming starts, so a rejected caller gets a plain JSON
//! 401 rather than an event stream.

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use tracing::warn;

use crate::config::ServerConfig;
use crate::error::AppError;

pub fn require_admin(config: &ServerConfig, headers: &HeaderMap) -> Result<(), AppError> {
    let Some(expected) = config.admin_token.as_deref() else {
        if config.allow_unauthenticated {
            return Ok(());
        }
        warn!("Admin request rejected: no admin token configured");
        return Err(AppError::Unauthorized(
            "Admin access is not configured".to_string(),
        ));
    };

    let provided = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim);

    match provided {
        Some(token) if tokens_match(token, expected) => Ok(()),
        Some(_) => {
            warn!("Admin request rejected: invalid token");
            Err(AppError::Unauthorized("Invalid admin token".to_string()))
        }
        None => Err(AppError::Unauthorized(
            "Missing bearer token".to_string(),
        )),
    }
}

/// Compare without exiting early on the first differing byte.
fn tokens_match(provided: &str, expected: &str) -> bool {
    let (a, b) = (provided.as_bytes(), expected.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
