use thiserror::Error;

/// Top-level error type for the `toonsync-api` crate.
///
/// Every transport failure is normalized into one of these variants at the
/// [`ApiClient`](crate::ApiClient) boundary, so callers never have to look at
/// raw `reqwest` errors. `toonsync-core` maps these into engine-level errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login rejected (wrong credentials, inactive account, etc.)
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// HTTP 401 on an authenticated call. The client turns this into a
    /// refresh-and-replay; callers only see it when that flow is bypassed.
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// Refresh token missing, expired or revoked. The session is cleared.
    #[error("Session expired -- re-authentication required")]
    SessionExpired,

    /// Account was created but the follow-up login did not succeed.
    #[error("Account created, but signing in failed: {source}")]
    RegisteredButLoginFailed {
        #[source]
        source: Box<Error>,
    },

    // ── Transport ───────────────────────────────────────────────────
    /// No HTTP response at all (DNS, refused connection, timeout).
    #[error("Server unreachable: {reason}")]
    NetworkUnreachable { reason: String },

    /// HTTP client construction or request building failed.
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The request was superseded and its cancellation token fired.
    #[error("Request cancelled")]
    Cancelled,

    // ── API ─────────────────────────────────────────────────────────
    /// 4xx carrying a field-level or form-level message from the server.
    #[error("Validation failed: {message}")]
    ValidationFailed { status: u16, message: String },

    /// HTTP 403.
    #[error("Access denied: {message}")]
    Forbidden { message: String },

    /// HTTP 404.
    #[error("Not found: {message}")]
    NotFound { message: String },

    /// Any other non-2xx response.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// Request body could not be encoded.
    #[error("Failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),

    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Persistence ─────────────────────────────────────────────────
    /// The token storage backend failed.
    #[error("Token storage error: {message}")]
    Storage { message: String },
}

/// Notice text for requests that never got an HTTP response.
pub const UNREACHABLE_MESSAGE: &str =
    "Unable to reach the server. Check your connection and try again.";
/// Notice text once the session cannot be renewed.
pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired. Please sign in again.";

impl Error {
    /// Normalize a `send()` failure. A send error means there was no HTTP
    /// response, except for request-building errors which are local bugs.
    pub(crate) fn from_send(err: reqwest::Error) -> Self {
        if err.is_builder() {
            Self::Transport(err)
        } else {
            Self::NetworkUnreachable {
                reason: err.to_string(),
            }
        }
    }

    /// Returns `true` if this error indicates auth has expired
    /// and re-authentication might resolve it.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::Unauthorized { .. } | Self::SessionExpired)
    }

    /// Returns `true` if the request was cancelled by its owner.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::NetworkUnreachable { .. } => true,
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { .. } => Some(401),
            Self::Forbidden { .. } => Some(403),
            Self::NotFound { .. } => Some(404),
            Self::ValidationFailed { status, .. } | Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Human-readable message suitable for a status notice.
    ///
    /// Server-supplied messages are surfaced verbatim; transport failures
    /// fall back to a generic connectivity notice.
    pub fn user_message(&self) -> String {
        match self {
            Self::NetworkUnreachable { .. } => UNREACHABLE_MESSAGE.into(),
            Self::Transport(e) if e.is_timeout() || e.is_connect() => UNREACHABLE_MESSAGE.into(),
            Self::Unauthorized { .. } | Self::SessionExpired => SESSION_EXPIRED_MESSAGE.into(),
            Self::Authentication { message }
            | Self::ValidationFailed { message, .. }
            | Self::Forbidden { message }
            | Self::NotFound { message }
            | Self::Api { message, .. } => message.clone(),
            Self::RegisteredButLoginFailed { source } => {
                format!("Your account was created, but signing in failed: {}", source.user_message())
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_errors_share_one_message() {
        let unauthorized = Error::Unauthorized {
            message: "Given token not valid".into(),
        };
        assert_eq!(unauthorized.user_message(), Error::SessionExpired.user_message());
        assert!(unauthorized.is_auth_expired());
    }

    #[test]
    fn validation_message_is_verbatim() {
        let err = Error::ValidationFailed {
            status: 400,
            message: "title: This field may not be blank.".into(),
        };
        assert_eq!(err.user_message(), "title: This field may not be blank.");
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn only_server_errors_are_transient() {
        assert!(
            Error::Api {
                status: 503,
                message: "unavailable".into()
            }
            .is_transient()
        );
        assert!(
            !Error::Api {
                status: 418,
                message: "teapot".into()
            }
            .is_transient()
        );
        assert!(!Error::Cancelled.is_transient());
    }
}
