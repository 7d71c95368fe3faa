//! Error-envelope decoding.
//!
//! The ERP system signals failure two ways: conventional HTTP error statuses,
//! and 2xx responses whose body carries an exception-type discriminator. Both
//! are normalized here into [`PersistenceError`] before any retry logic looks
//! at an outcome.

use chrono::{DateTime, Utc};
use foreman_core::retry::parse_retry_after;
use foreman_core::PersistenceError;
use serde_json::Value;

use crate::transport::ErpResponse;

const BODY_PREVIEW_CHARS: usize = 200;

/// Decode a raw response into the success body or a typed failure.
pub fn decode(response: ErpResponse, now: DateTime<Utc>) -> Result<Value, PersistenceError> {
    if (200..300).contains(&response.status) {
        return decode_success_body(response.body);
    }

    Err(match response.status {
        401 | 403 => PersistenceError::Auth,
        404 => PersistenceError::NotFound,
        417 => PersistenceError::Validation { messages: validation_messages(&response.body) },
        429 => PersistenceError::RateLimited {
            retry_after_secs: response
                .retry_after
                .as_deref()
                .and_then(|raw| parse_retry_after(raw, now)),
        },
        status if status >= 500 => PersistenceError::Server { status },
        status => PersistenceError::Unknown(format!(
            "status {status}: {}",
            body_preview(&response.body)
        )),
    })
}

/// A 2xx body can still encode a failure through `exc_type`.
fn decode_success_body(body: Value) -> Result<Value, PersistenceError> {
    let Some(exc_type) = body.get("exc_type").and_then(Value::as_str) else {
        return Ok(body);
    };

    if exc_type.contains("Validation") || exc_type.contains("Mandatory") {
        return Err(PersistenceError::Validation { messages: validation_messages(&body) });
    }
    if exc_type.contains("Authentication") || exc_type.contains("Permission") {
        return Err(PersistenceError::Auth);
    }
    Err(PersistenceError::Unknown(format!("{exc_type}: {}", body_preview(&body))))
}

/// Pull the human-readable message(s) out of a validation envelope.
///
/// `_server_messages` is doubly encoded: a JSON string holding an array of
/// JSON strings, each of which holds an object with a `message` field. Every
/// layer is decoded leniently; whatever survives is surfaced verbatim.
pub fn validation_messages(body: &Value) -> Vec<String> {
    let mut messages = Vec::new();

    if let Some(raw) = body.get("_server_messages").and_then(Value::as_str) {
        if let Ok(Value::Array(entries)) = serde_json::from_str::<Value>(raw) {
            for entry in entries {
                let message = match entry {
                    Value::String(inner) => serde_json::from_str::<Value>(&inner)
                        .ok()
                        .and_then(|value| {
                            value.get("message").and_then(Value::as_str).map(str::to_string)
                        })
                        .or(Some(inner)),
                    Value::Object(map) => {
                        map.get("message").and_then(Value::as_str).map(str::to_string)
                    }
                    _ => None,
                };
                if let Some(message) = message {
                    if !message.trim().is_empty() {
                        messages.push(message);
                    }
                }
            }
        }
    }

    if messages.is_empty() {
        if let Some(exception) = body.get("exception").and_then(Value::as_str) {
            messages.push(exception.to_string());
        }
    }
    if messages.is_empty() {
        messages.push("record validation failed".to_string());
    }

    messages
}

fn body_preview(body: &Value) -> String {
    body.to_string().chars().take(BODY_PREVIEW_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn response(status: u16, body: Value) -> ErpResponse {
        ErpResponse { status, body, retry_after: None }
    }

    #[test]
    fn success_body_passes_through() {
        let body = json!({ "data": { "name": "MV-0001" } });
        let decoded = decode(response(200, body.clone()), Utc::now()).unwrap();
        assert_eq!(decoded, body);
    }

    #[test]
    fn http_200_with_exception_body_is_an_error() {
        let body = json!({
            "exc_type": "ValidationError",
            "_server_messages": "[\"{\\\"message\\\": \\\"Customer is mandatory\\\"}\"]"
        });
        let error = decode(response(200, body), Utc::now()).unwrap_err();
        assert_eq!(
            error,
            PersistenceError::Validation { messages: vec!["Customer is mandatory".to_string()] }
        );
    }

    #[test]
    fn http_417_extracts_nested_server_messages() {
        let body = json!({
            "_server_messages":
                "[\"{\\\"message\\\": \\\"Customer is mandatory\\\"}\", \"{\\\"message\\\": \\\"Date is invalid\\\"}\"]"
        });
        let error = decode(response(417, body), Utc::now()).unwrap_err();
        assert_eq!(
            error,
            PersistenceError::Validation {
                messages: vec!["Customer is mandatory".to_string(), "Date is invalid".to_string()]
            }
        );
    }

    #[test]
    fn malformed_server_messages_fall_back_to_generic_text() {
        let body = json!({ "_server_messages": "not json at all" });
        let error = decode(response(417, body), Utc::now()).unwrap_err();
        assert_eq!(
            error,
            PersistenceError::Validation {
                messages: vec!["record validation failed".to_string()]
            }
        );
    }

    #[test]
    fn auth_statuses_map_to_auth() {
        assert_eq!(decode(response(401, json!({})), Utc::now()).unwrap_err(), PersistenceError::Auth);
        assert_eq!(decode(response(403, json!({})), Utc::now()).unwrap_err(), PersistenceError::Auth);
    }

    #[test]
    fn rate_limit_carries_parsed_retry_after() {
        let raw = ErpResponse {
            status: 429,
            body: json!({}),
            retry_after: Some("7".to_string()),
        };
        assert_eq!(
            decode(raw, Utc::now()).unwrap_err(),
            PersistenceError::RateLimited { retry_after_secs: Some(7) }
        );
    }

    #[test]
    fn server_errors_keep_their_status() {
        let error = decode(response(503, json!({})), Utc::now()).unwrap_err();
        assert_eq!(error, PersistenceError::Server { status: 503 });
    }
}
