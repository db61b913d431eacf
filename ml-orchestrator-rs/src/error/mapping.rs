//! Error mapping for HTTP collaborators
//!
//! Converts non-success HTTP responses from the object store, batch scheduler
//! and message queue into our normalized ServiceError type.

use reqwest::StatusCode;
use serde_json::Value;

use super::ServiceError;

/// Map an HTTP error response to a ServiceError
pub fn map_http_error(service: &str, status: StatusCode, body: &str) -> ServiceError {
    let message = extract_message(body).unwrap_or_else(|| {
        if body.is_empty() {
            status.to_string()
        } else if body.len() > 100 {
            format!("{}: {:.100}...", status, body)
        } else {
            format!("{}: {}", status, body)
        }
    });
    let message = format!("{} returned {}", service, message);

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ServiceError::authentication(message),
        StatusCode::NOT_FOUND => ServiceError::not_found(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            ServiceError::validation(message)
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ServiceError::network(message),
        _ => ServiceError::service(message),
    }
}

/// Pull a human readable message out of a JSON error body.
///
/// Batch-style APIs use `message`, queue-style APIs nest it under
/// `Error.Message`, generic gateways use `error`.
fn extract_message(body: &str) -> Option<String> {
    let json = serde_json::from_str::<Value>(body).ok()?;
    json.get("message")
        .or_else(|| json.get("Message"))
        .or_else(|| json.get("Error").and_then(|e| e.get("Message")))
        .or_else(|| json.get("error"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
}

/// Helper function to classify HTTP errors by category
pub fn classify_http_error(status: StatusCode) -> &'static str {
    match status.as_u16() {
        400 | 422 => "validation",
        401 | 403 => "authentication",
        404 => "not_found",
        408 | 504 => "timeout",
        429 => "throttled",
        500..=599 => "server",
        _ => "unknown",
    }
}
