use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured error carried inside a gateway result envelope.
///
/// Every remote operation that fails at the gateway (resolver error,
/// validation failure, upstream outage) is reported through this type,
/// not through a transport-level error. It round-trips over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("Gateway error: {message}")]
pub struct GatewayError {
    /// Human-readable failure description.
    pub message: String,

    /// Machine-readable error code, e.g. `"InputValidationError"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// HTTP status the gateway answered with, if the failure surfaced
    /// as a non-2xx response rather than an in-band envelope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

impl GatewayError {
    /// Build a gateway error from a bare non-2xx response.
    ///
    /// Used when the body is not a parseable envelope -- the status line
    /// is all we know.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = if body.trim().is_empty() {
            format!("gateway responded with HTTP {status}")
        } else {
            body.trim().to_string()
        };
        Self {
            message,
            code: None,
            status_code: Some(status),
        }
    }
}

/// Top-level error type for the `eddy-api` crate.
///
/// Covers every failure mode across all client surfaces: authentication,
/// transport, operation dispatch, streaming, and uploads. `eddy-core`
/// maps these into consumer-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// No authenticated session (cookie missing, expired, or revoked).
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Auth flow failed for a reason other than a missing session.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// Login requested for a provider the gateway does not expose.
    #[error("Unknown auth provider: {provider}")]
    UnknownAuthProvider { provider: String },

    // ── Operation dispatch ──────────────────────────────────────────
    /// Operation name absent from the generated metadata registry.
    #[error("Unknown operation: {name}")]
    UnknownOperation { name: String },

    /// Operation input could not be serialized for the wire.
    #[error("Invalid operation input: {0}")]
    InvalidInput(String),

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout).
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL construction error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Gateway ─────────────────────────────────────────────────────
    /// Structured error reported by the gateway itself.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    // ── Streaming ───────────────────────────────────────────────────
    /// Subscription stream could not be established, or dropped with a
    /// transport failure mid-stream.
    #[error("Subscription stream failed: {0}")]
    SubscribeConnect(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error indicates the session is gone and
    /// re-authentication might resolve it.
    pub fn is_auth_expired(&self) -> bool {
        match self {
            Self::NotAuthenticated | Self::Authentication { .. } => true,
            Self::Gateway(e) => e.status_code == Some(401),
            _ => false,
        }
    }

    /// Returns `true` if this is a transient failure worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::SubscribeConnect(_) => true,
            _ => false,
        }
    }

    /// Extract the gateway error code, if available.
    pub fn gateway_code(&self) -> Option<&str> {
        match self {
            Self::Gateway(e) => e.code.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_error_from_bare_status() {
        let err = GatewayError::from_status(502, "");
        assert_eq!(err.message, "gateway responded with HTTP 502");
        assert_eq!(err.status_code, Some(502));
        assert!(err.code.is_none());
    }

    #[test]
    fn gateway_error_from_status_with_body() {
        let err = GatewayError::from_status(500, "upstream exploded\n");
        assert_eq!(err.message, "upstream exploded");
        assert_eq!(err.status_code, Some(500));
    }

    #[test]
    fn gateway_error_roundtrip() {
        let err = GatewayError {
            message: "validation failed".into(),
            code: Some("InputValidationError".into()),
            status_code: None,
        };
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, r#"{"message":"validation failed","code":"InputValidationError"}"#);
        let back: GatewayError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }

    #[test]
    fn auth_expiry_predicate() {
        assert!(Error::NotAuthenticated.is_auth_expired());
        assert!(
            Error::Gateway(GatewayError::from_status(401, "")).is_auth_expired()
        );
        assert!(!Error::Gateway(GatewayError::from_status(500, "")).is_auth_expired());
    }

    #[test]
    fn transient_predicate() {
        assert!(Error::SubscribeConnect("connection reset".into()).is_transient());
        assert!(!Error::NotAuthenticated.is_transient());
    }
}
