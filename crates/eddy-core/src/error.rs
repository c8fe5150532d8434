// ── Core error types ──
//
// Consumer-facing errors from eddy-core. These are NOT transport-specific
// -- consumers never see reqwest failures or raw response bodies directly.
// The `From<eddy_api::Error>` impl translates transport-layer errors into
// domain-appropriate variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    // ── Operation errors ─────────────────────────────────────────────
    /// The gateway reported a structured failure for this operation.
    #[error("Operation rejected by gateway: {message}")]
    Rejected {
        message: String,
        /// Gateway error code (e.g., "InputValidationError").
        code: Option<String>,
        /// HTTP status code (if the failure surfaced as one).
        status: Option<u16>,
    },

    #[error("Unknown operation: {name}")]
    UnknownOperation { name: String },

    #[error("Invalid operation input: {message}")]
    InvalidInput { message: String },

    // ── Transport errors ─────────────────────────────────────────────
    #[error("Transport failure: {message}")]
    TransportFailed { message: String },

    #[error("Subscription failed: {message}")]
    SubscriptionFailed { message: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Deserialization error: {message}")]
    Deserialization { message: String },

    // ── Lifecycle ────────────────────────────────────────────────────
    #[error("Operation cancelled")]
    Cancelled,

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Returns `true` if re-authenticating might resolve this error.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationRequired | Self::AuthenticationFailed { .. }
        )
    }

    /// The gateway error code, if this failure carries one.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Rejected { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<eddy_api::Error> for CoreError {
    fn from(err: eddy_api::Error) -> Self {
        match err {
            eddy_api::Error::NotAuthenticated => CoreError::AuthenticationRequired,
            eddy_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            eddy_api::Error::UnknownAuthProvider { provider } => CoreError::AuthenticationFailed {
                message: format!("unknown auth provider: {provider}"),
            },
            eddy_api::Error::UnknownOperation { name } => CoreError::UnknownOperation { name },
            eddy_api::Error::InvalidInput(message) => CoreError::InvalidInput { message },
            eddy_api::Error::Transport(e) => CoreError::TransportFailed {
                message: e.to_string(),
            },
            eddy_api::Error::InvalidUrl(e) => CoreError::InvalidInput {
                message: e.to_string(),
            },
            eddy_api::Error::Tls(message) => CoreError::TransportFailed { message },
            eddy_api::Error::Gateway(gw) => CoreError::Rejected {
                message: gw.message,
                code: gw.code,
                status: gw.status_code,
            },
            eddy_api::Error::SubscribeConnect(message) => {
                CoreError::SubscriptionFailed { message }
            }
            eddy_api::Error::Deserialization { message, .. } => {
                CoreError::Deserialization { message }
            }
        }
    }
}
