//! JSON text handed back to tool callers.

use {
    camper_oauth::AuthError,
    serde_json::{Value, json},
    tracing::warn,
};

use crate::error::{ApiError, FetchError};

/// Render an operation result as pretty JSON.
///
/// Failures become `{"error", "kind", "status"?, "details"?}` so the caller
/// always receives a well-formed document.
pub fn tool_response(result: Result<Value, ApiError>) -> String {
    let value = match result {
        Ok(value) => value,
        Err(err) => {
            warn!(error = %err, "api operation failed");
            error_payload(&err)
        },
    };
    serde_json::to_string_pretty(&value).unwrap_or_else(|e| {
        json!({ "error": format!("failed to encode response: {e}"), "kind": "encoding" })
            .to_string()
    })
}

pub fn error_payload(err: &ApiError) -> Value {
    let mut payload = json!({ "kind": kind(err) });

    match err {
        ApiError::Fetch(FetchError::Status { url, status, body }) => {
            let message = if *status == 404 {
                format!("not found: {}", url.path())
            } else {
                format!("Basecamp API returned HTTP {status}")
            };
            payload["error"] = Value::String(message);
            payload["status"] = Value::from(*status);
            if !body.trim().is_empty() {
                payload["details"] = serde_json::from_str(body)
                    .unwrap_or_else(|_| Value::String(body.clone()));
            }
        },
        ApiError::Auth(AuthError::Rejected { status, body }) => {
            payload["error"] = Value::String(
                "authentication failed: token refresh was rejected".to_string(),
            );
            payload["status"] = Value::from(*status);
            payload["details"] = Value::String(body.clone());
        },
        other => {
            payload["error"] = Value::String(other.to_string());
        },
    }
    payload
}

fn kind(err: &ApiError) -> &'static str {
    match err {
        ApiError::Auth(_) => "auth",
        ApiError::Fetch(FetchError::Status { .. }) => "status",
        ApiError::Fetch(FetchError::Transport { .. }) => "transport",
        ApiError::Fetch(FetchError::MalformedBody { .. }) => "malformed_body",
        ApiError::Fetch(FetchError::MissingItemsField { .. }) => "missing_items_field",
        ApiError::Fetch(FetchError::InvalidNextLink { .. }) => "invalid_next_link",
        ApiError::Encoding(_) => "encoding",
        ApiError::InvalidEndpoint { .. } => "invalid_endpoint",
    }
}
