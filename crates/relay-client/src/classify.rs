//! Transport-boundary error classifier
//!
//! Converts a failed response (status code + decoded payload) into one of the
//! [`ClientError`] variants, in a fixed priority order: 404, then 422 or a
//! field-error payload, then 5xx, then the generic catch-all. Applied by the
//! dispatch layer to every non-success response before it reaches a caller.

use crate::error::{ClientError, ErrorDetails};
use relay_core_resilience::FailureClassification;
use serde_json::Value;

/// Longest payload excerpt carried in error context.
const PAYLOAD_EXCERPT_LIMIT: usize = 512;

/// Classify a failed response into a typed error.
///
/// `operation` is the logical action being performed (e.g. `"raw_call"`); it
/// is retained on the resulting error so handlers can tell what was being
/// attempted without parsing the message.
pub fn classify_response(status: u16, payload: &Value, operation: &str) -> ClientError {
    let message = payload_message(payload).unwrap_or_else(|| format!("HTTP {status}"));
    let details = ErrorDetails::for_operation(operation).status(status);

    if status == 404 {
        return ClientError::NotFound { message, details };
    }

    if status == 422 || !field_errors(payload).is_empty() {
        let fields = field_errors(payload);
        let details = if fields.is_empty() {
            details
        } else {
            details.context("fields", fields.join(", "))
        };
        return ClientError::Validation { message, details };
    }

    if (500..600).contains(&status) {
        return ClientError::Server { message, details };
    }

    ClientError::Http {
        message,
        details: details.context("payload", payload_excerpt(payload)),
    }
}

/// Human-readable message from a backend error payload, if it carries one.
fn payload_message(payload: &Value) -> Option<String> {
    for key in ["message", "error"] {
        if let Some(text) = payload.get(key).and_then(Value::as_str) {
            return Some(text.to_string());
        }
    }
    None
}

/// Offending field names from a field-level validation payload.
///
/// The backend reports these as `{"errors": {"<field>": ...}}`; anything else
/// under `"errors"` is not treated as field-level.
fn field_errors(payload: &Value) -> Vec<String> {
    match payload.get("errors") {
        Some(Value::Object(map)) => map.keys().cloned().collect(),
        _ => Vec::new(),
    }
}

fn payload_excerpt(payload: &Value) -> String {
    if payload.is_null() {
        return String::new();
    }
    let mut text = payload.to_string();
    if text.len() > PAYLOAD_EXCERPT_LIMIT {
        text.truncate(PAYLOAD_EXCERPT_LIMIT);
    }
    text
}

/// Which client errors count as evidence of backend unhealthiness.
///
/// Server-side failures (5xx) and status-less transport failures (connect
/// errors, timeouts) trip the breaker. Validation and not-found errors
/// indicate caller error, not an unhealthy backend, and so does any other
/// response that did carry a 4xx status. Breaker rejections never count.
impl FailureClassification for ClientError {
    fn trips_breaker(&self) -> bool {
        match self {
            ClientError::Server { .. } => true,
            ClientError::Http { details, .. } => details.status_code.is_none(),
            ClientError::Validation { .. }
            | ClientError::NotFound { .. }
            | ClientError::CircuitOpen { .. } => false,
        }
    }
}
