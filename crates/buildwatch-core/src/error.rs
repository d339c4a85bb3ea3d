// ── Core error types ──
//
// `ServiceError` is what adapters produce; it never escapes the controller
// as a panic or a `Result`, only as event or response payloads.
// `CoreError` covers misuse of the core itself (unknown types, malformed
// bridge messages). The `From<buildwatch_api::Error>` impl translates
// transport-layer errors into service-level variants.

use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;
use thiserror::Error;

/// Failure reported by a service adapter.
#[derive(Debug, Error, IntoStaticStr)]
pub enum ServiceError {
    #[error("Cannot reach {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    #[error("Unexpected response: {message}")]
    InvalidResponse { message: String },

    #[error("Invalid settings for {service}: {message}")]
    InvalidSettings { service: String, message: String },

    #[error("Unknown service type: {base_url}")]
    UnknownServiceType { base_url: String },

    #[error("Service stopped")]
    Stopped,

    #[error("{message}")]
    Failed { message: String },
}

impl ServiceError {
    /// Variant name, used as the `name` of the wire payload.
    pub fn kind(&self) -> &'static str {
        self.into()
    }

    /// Serializable `{ name, message }` form sent to UI surfaces.
    pub fn payload(&self) -> ErrorPayload {
        ErrorPayload {
            name: self.kind().to_owned(),
            message: self.to_string(),
        }
    }
}

/// Wire shape of an error: `{ "name": ..., "message": ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub name: String,
    pub message: String,
}

impl From<&ServiceError> for ErrorPayload {
    fn from(err: &ServiceError) -> Self {
        err.payload()
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<buildwatch_api::Error> for ServiceError {
    fn from(err: buildwatch_api::Error) -> Self {
        match err {
            buildwatch_api::Error::Authentication { message } => {
                ServiceError::AuthenticationFailed { message }
            }
            buildwatch_api::Error::Transport(ref e) => {
                if let Some(status) = e.status() {
                    ServiceError::Server {
                        status: status.as_u16(),
                        message: e.to_string(),
                    }
                } else {
                    ServiceError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: if e.is_timeout() {
                            format!("timed out: {e}")
                        } else {
                            e.to_string()
                        },
                    }
                }
            }
            buildwatch_api::Error::InvalidUrl(e) => ServiceError::InvalidResponse {
                message: format!("invalid URL: {e}"),
            },
            buildwatch_api::Error::InvalidBaseUrl(url) => ServiceError::ConnectionFailed {
                url,
                reason: "URL cannot be used as a server address".into(),
            },
            buildwatch_api::Error::Tls(reason) => ServiceError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {reason}"),
            },
            buildwatch_api::Error::NotFound { resource } => ServiceError::NotFound { resource },
            buildwatch_api::Error::Http { status, message } => {
                ServiceError::Server { status, message }
            }
            buildwatch_api::Error::Deserialization { message, body: _ } => {
                ServiceError::InvalidResponse { message }
            }
        }
    }
}

/// Misuse of the core API.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Unknown service type: {base_url}")]
    UnknownServiceType { base_url: String },

    #[error("Invalid message: {reason}")]
    InvalidMessage { reason: String },

    #[error("Unknown channel: {name}")]
    UnknownChannel { name: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_uses_variant_name() {
        let err = ServiceError::NotFound {
            resource: "job 'core'".into(),
        };
        let payload = err.payload();
        assert_eq!(payload.name, "NotFound");
        assert_eq!(payload.message, "Not found: job 'core'");
    }

    #[test]
    fn api_auth_error_maps_to_authentication_failed() {
        let err = ServiceError::from(buildwatch_api::Error::Authentication {
            message: "nope".into(),
        });
        assert!(matches!(err, ServiceError::AuthenticationFailed { .. }));
    }

    #[test]
    fn api_http_error_keeps_status() {
        let err = ServiceError::from(buildwatch_api::Error::Http {
            status: 502,
            message: "bad gateway".into(),
        });
        assert_eq!(err.kind(), "Server");
        assert_eq!(err.to_string(), "Server error (HTTP 502): bad gateway");
    }
}
