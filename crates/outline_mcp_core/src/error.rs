use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub type FieldErrors = BTreeMap<String, Vec<String>>;

pub type Result<T> = std::result::Result<T, OutlineError>;

pub const TIMEOUT_STATUS: u16 = 408;
pub const NETWORK_STATUS: u16 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Authentication,
    NotFound,
    RateLimit,
    Api,
    Timeout,
    Network,
}

/// Failures raised by the Outline client.
///
/// Remote failures always keep the HTTP status and the raw response body so
/// callers can render diagnostics without re-issuing the request.
#[derive(Debug, Error)]
pub enum OutlineError {
    #[error("{message}")]
    Validation {
        message: String,
        errors: FieldErrors,
        body: Option<String>,
    },

    #[error("{message}")]
    Authentication {
        message: String,
        body: Option<String>,
    },

    #[error("{resource} '{id}' not found")]
    NotFound {
        resource: String,
        id: String,
        body: Option<String>,
    },

    #[error("{message}")]
    RateLimit {
        message: String,
        retry_after: Option<u64>,
        body: Option<String>,
    },

    #[error("{message}")]
    Api {
        message: String,
        status: u16,
        code: Option<String>,
        body: Option<String>,
    },

    #[error("Request timed out. The server took too long to respond.")]
    Timeout { detail: String },

    #[error("Network error: {detail}")]
    Network { detail: String },
}

impl OutlineError {
    pub fn validation(message: impl Into<String>, errors: FieldErrors) -> Self {
        Self::Validation {
            message: message.into(),
            errors,
            body: None,
        }
    }

    /// Single-field validation failure.
    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![message.clone()]);
        Self::validation(message, errors)
    }

    pub fn not_found(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.into(),
            body: None,
        }
    }

    pub fn null_response(message: impl Into<String>) -> Self {
        Self::Api {
            message: message.into(),
            status: 500,
            code: Some("null_response".to_string()),
            body: None,
        }
    }

    pub fn deserialization(body: &str) -> Self {
        Self::Api {
            message: "Failed to deserialize API response".to_string(),
            status: 500,
            code: Some("deserialization_failed".to_string()),
            body: Some(body.to_string()),
        }
    }

    /// Map a non-2xx reply onto the taxonomy. Every status lands somewhere.
    pub fn from_status(status: u16, endpoint: &str, body: &str) -> Self {
        let envelope = ErrorEnvelope::parse(body);
        let raw = Some(body.to_string());
        match status {
            401 => Self::Authentication {
                message: envelope
                    .message
                    .unwrap_or_else(|| "Authentication failed. Check your API key.".to_string()),
                body: raw,
            },
            404 => Self::NotFound {
                resource: "Resource".to_string(),
                id: endpoint.to_string(),
                body: raw,
            },
            429 => Self::RateLimit {
                message: envelope
                    .message
                    .unwrap_or_else(|| "Rate limit exceeded. Please try again later.".to_string()),
                retry_after: envelope.retry_after,
                body: raw,
            },
            400 => Self::Validation {
                message: envelope
                    .message
                    .unwrap_or_else(|| "Invalid request data".to_string()),
                errors: FieldErrors::new(),
                body: raw,
            },
            other => Self::Api {
                message: envelope
                    .message
                    .unwrap_or_else(|| format!("API request failed with status {other}")),
                status: other,
                code: envelope.error,
                body: raw,
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Authentication { .. } => ErrorKind::Authentication,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::RateLimit { .. } => ErrorKind::RateLimit,
            Self::Api { .. } => ErrorKind::Api,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Network { .. } => ErrorKind::Network,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Validation { .. } => Some(400),
            Self::Authentication { .. } => Some(401),
            Self::NotFound { .. } => Some(404),
            Self::RateLimit { .. } => Some(429),
            Self::Api { status, .. } => Some(*status),
            Self::Timeout { .. } => Some(TIMEOUT_STATUS),
            Self::Network { .. } => Some(NETWORK_STATUS),
        }
    }

    pub fn error_code(&self) -> Option<&str> {
        match self {
            Self::Validation { .. } => Some("validation_error"),
            Self::Authentication { .. } => Some("authentication_failed"),
            Self::NotFound { .. } => Some("not_found"),
            Self::RateLimit { .. } => Some("rate_limit_exceeded"),
            Self::Api { code, .. } => code.as_deref(),
            Self::Timeout { .. } => Some("timeout"),
            Self::Network { .. } => Some("network_error"),
        }
    }

    /// Raw response body, or the transport detail for timeout/network failures.
    pub fn response_body(&self) -> Option<&str> {
        match self {
            Self::Validation { body, .. }
            | Self::Authentication { body, .. }
            | Self::NotFound { body, .. }
            | Self::RateLimit { body, .. }
            | Self::Api { body, .. } => body.as_deref(),
            Self::Timeout { detail } | Self::Network { detail } => Some(detail.as_str()),
        }
    }

    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::Validation { errors, .. } => Some(errors),
            _ => None,
        }
    }

    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Self::RateLimit { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Authentication { .. } => Some(
                "Check if your OUTLINE_API_KEY is correct and has the necessary permissions",
            ),
            Self::RateLimit { .. } => Some("Please wait before making more requests"),
            Self::Timeout { .. } | Self::Network { .. } => {
                Some("Check that OUTLINE_BASE_URL points at a reachable Outline instance")
            }
            _ => None,
        }
    }
}

/// Body shape the remote API uses for failures.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorEnvelope {
    pub message: Option<String>,
    pub error: Option<String>,
    pub retry_after: Option<u64>,
}

impl ErrorEnvelope {
    /// Lenient parse: anything unreadable becomes an empty envelope.
    pub fn parse(body: &str) -> Self {
        let Ok(Value::Object(root)) = serde_json::from_str::<Value>(body) else {
            return Self::default();
        };
        let text = |key: &str| root.get(key).and_then(Value::as_str).map(ToString::to_string);
        Self {
            message: text("message"),
            error: text("error"),
            retry_after: root.get("retryAfter").and_then(Value::as_u64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_401_to_authentication_with_envelope_message() {
        let body = r#"{"error":"authentication_required","message":"Bad Authorization header format"}"#;
        let error = OutlineError::from_status(401, "collections.list", body);
        assert_eq!(error.kind(), ErrorKind::Authentication);
        assert_eq!(error.status_code(), Some(401));
        assert_eq!(error.to_string(), "Bad Authorization header format");
        assert_eq!(error.response_body(), Some(body));
        assert!(error.hint().is_some());
    }

    #[test]
    fn maps_404_to_not_found_naming_the_endpoint() {
        let error = OutlineError::from_status(404, "documents.info", "{}");
        assert_eq!(error.kind(), ErrorKind::NotFound);
        assert_eq!(error.to_string(), "Resource 'documents.info' not found");
        assert_eq!(error.error_code(), Some("not_found"));
    }

    #[test]
    fn maps_429_and_keeps_retry_after() {
        let error = OutlineError::from_status(429, "documents.search", r#"{"retryAfter":60}"#);
        assert_eq!(error.kind(), ErrorKind::RateLimit);
        assert_eq!(error.status_code(), Some(429));
        assert_eq!(error.retry_after(), Some(60));
        assert_eq!(
            error.to_string(),
            "Rate limit exceeded. Please try again later."
        );
    }

    #[test]
    fn maps_400_to_validation_with_empty_field_map() {
        let error = OutlineError::from_status(400, "documents.create", r#"{"message":"title: required"}"#);
        assert_eq!(error.kind(), ErrorKind::Validation);
        assert_eq!(error.to_string(), "title: required");
        assert!(error.field_errors().expect("field map").is_empty());
        assert!(error.response_body().is_some());
    }

    #[test]
    fn unmapped_status_becomes_generic_api_error() {
        let body = r#"{"error":"internal_error","message":"boom"}"#;
        let error = OutlineError::from_status(503, "documents.update", body);
        assert_eq!(error.kind(), ErrorKind::Api);
        assert_eq!(error.status_code(), Some(503));
        assert_eq!(error.error_code(), Some("internal_error"));
        assert_eq!(error.response_body(), Some(body));
    }

    #[test]
    fn unparsable_body_falls_back_to_default_messages() {
        let error = OutlineError::from_status(500, "collections.list", "<html>oops</html>");
        assert_eq!(error.to_string(), "API request failed with status 500");
        assert_eq!(error.error_code(), None);
        assert_eq!(error.response_body(), Some("<html>oops</html>"));
    }

    #[test]
    fn error_envelope_ignores_non_object_payloads() {
        assert_eq!(ErrorEnvelope::parse("[1,2]"), ErrorEnvelope::default());
        assert_eq!(ErrorEnvelope::parse(""), ErrorEnvelope::default());
    }

    #[test]
    fn transport_kinds_have_fixed_codes() {
        let timeout = OutlineError::Timeout {
            detail: "deadline".to_string(),
        };
        assert_eq!(timeout.status_code(), Some(408));
        assert_eq!(timeout.error_code(), Some("timeout"));

        let network = OutlineError::Network {
            detail: "connection refused".to_string(),
        };
        assert_eq!(network.status_code(), Some(0));
        assert_eq!(network.error_code(), Some("network_error"));
        assert_eq!(network.to_string(), "Network error: connection refused");
    }

    #[test]
    fn invalid_field_builds_single_entry_map() {
        let error = OutlineError::invalid_field("documentId", "Document ID is required");
        let errors = error.field_errors().expect("field map");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors["documentId"], vec!["Document ID is required"]);
    }
}
