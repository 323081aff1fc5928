// ── Core error types ──
//
// Errors surfaced by the sync engine. The engine never looks at transport
// details; the `From<toonsync_api::Error>` impl folds gateway errors into
// the variants consumers act on.

use thiserror::Error;

pub(crate) use toonsync_api::{SESSION_EXPIRED_MESSAGE, UNREACHABLE_MESSAGE};

pub(crate) const SIGN_IN_MESSAGE: &str = "Please sign in to manage your webtoons.";
pub(crate) const NO_FEATURE_MESSAGE: &str = "Your account is not allowed to manage webtoons.";

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Session ──────────────────────────────────────────────────────
    #[error("Server unreachable: {reason}")]
    NetworkUnreachable { reason: String },

    #[error("Session expired -- sign in again")]
    SessionExpired,

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Not signed in")]
    NotAuthenticated,

    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    // ── Data ─────────────────────────────────────────────────────────
    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Not found: {message}")]
    NotFound { message: String },

    /// Superseded by a newer request. Never shown to the user.
    #[error("Operation cancelled")]
    Cancelled,

    #[error("API error: {message}")]
    Api {
        message: String,
        status: Option<u16>,
    },

    // ── Local ────────────────────────────────────────────────────────
    #[error("Token storage error: {message}")]
    Storage { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from gateway errors ──────────────────────────────────

impl From<toonsync_api::Error> for CoreError {
    fn from(err: toonsync_api::Error) -> Self {
        use toonsync_api::Error as Api;

        match err {
            Api::Authentication { message } => CoreError::AuthenticationFailed { message },
            err @ Api::RegisteredButLoginFailed { .. } => CoreError::AuthenticationFailed {
                message: err.user_message(),
            },
            Api::Unauthorized { .. } | Api::SessionExpired => CoreError::SessionExpired,
            Api::NetworkUnreachable { reason } => CoreError::NetworkUnreachable { reason },
            Api::Transport(ref e) if e.is_timeout() || e.is_connect() => {
                CoreError::NetworkUnreachable {
                    reason: e.to_string(),
                }
            }
            Api::Transport(e) => CoreError::Api {
                message: e.to_string(),
                status: e.status().map(|s| s.as_u16()),
            },
            Api::Cancelled => CoreError::Cancelled,
            Api::ValidationFailed { message, .. } => CoreError::ValidationFailed { message },
            Api::Forbidden { message } => CoreError::PermissionDenied { message },
            Api::NotFound { message } => CoreError::NotFound { message },
            Api::Api { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            Api::Deserialization { message, .. } => CoreError::Api {
                message: format!("unexpected response: {message}"),
                status: None,
            },
            Api::Storage { message } => CoreError::Storage { message },
            Api::InvalidUrl(e) => CoreError::Internal(format!("invalid URL: {e}")),
            Api::Encode(e) => CoreError::Internal(format!("request encoding failed: {e}")),
        }
    }
}

impl CoreError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// The user must sign in (again) before retrying.
    pub fn requires_reauth(&self) -> bool {
        matches!(self, Self::SessionExpired | Self::NotAuthenticated)
    }

    /// Message suitable for a status notice.
    pub fn user_message(&self) -> String {
        match self {
            Self::NetworkUnreachable { .. } => UNREACHABLE_MESSAGE.into(),
            Self::SessionExpired => SESSION_EXPIRED_MESSAGE.into(),
            Self::NotAuthenticated => SIGN_IN_MESSAGE.into(),
            Self::AuthenticationFailed { message }
            | Self::PermissionDenied { message }
            | Self::ValidationFailed { message }
            | Self::NotFound { message }
            | Self::Api { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}
