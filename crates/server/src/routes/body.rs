use axum::body::Bytes;
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// Parse an optional JSON body: an empty (or all-whitespace) body yields
/// the default value, anything else must be valid JSON.
pub(crate) fn optional_json<T>(body: &Bytes) -> Result<T, AppError>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("Invalid request body: {}", e)))
}
