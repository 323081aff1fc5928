//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use toonsync_config::ConfigError;
use toonsync_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const PERMISSION: i32 = 5;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
#[allow(unused_assignments)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the server")]
    #[diagnostic(
        code(toonsync::unreachable),
        help(
            "Check that the server is running and that api_url in your profile is right.\n\
             Reason: {reason}"
        )
    )]
    Unreachable { reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Sign-in failed: {message}")]
    #[diagnostic(
        code(toonsync::auth_failed),
        help("Check your username and password, then run: toonsync login")
    )]
    AuthFailed { message: String },

    #[error("Not signed in (profile '{profile}')")]
    #[diagnostic(
        code(toonsync::not_signed_in),
        help("Run: toonsync login --profile {profile}")
    )]
    NotSignedIn { profile: String },

    #[error("Session expired")]
    #[diagnostic(code(toonsync::session_expired), help("Run: toonsync login"))]
    SessionExpired,

    #[error("Permission denied: {message}")]
    #[diagnostic(
        code(toonsync::permission_denied),
        help("Your account needs the webtoon management feature. Ask an administrator.")
    )]
    PermissionDenied { message: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(
        code(toonsync::not_found),
        help("Run: toonsync list to see your webtoons")
    )]
    NotFound { message: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error("API error ({status}): {message}")]
    #[diagnostic(code(toonsync::api_error))]
    ApiError { status: String, message: String },

    #[error("Request was cancelled")]
    #[diagnostic(code(toonsync::cancelled))]
    Cancelled,

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(toonsync::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(toonsync::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: toonsync config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error(transparent)]
    #[diagnostic(code(toonsync::config))]
    Config(Box<figment::Error>),

    #[error("Token storage failed: {message}")]
    #[diagnostic(
        code(toonsync::storage),
        help("Try another store with --token-store file or --token-store memory")
    )]
    Storage { message: String },

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(toonsync::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── IO / Serialization ────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(toonsync::json), help("Check the JSON file contents and try again."))]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    #[diagnostic(code(toonsync::internal))]
    Internal(String),
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Unreachable { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NotSignedIn { .. } | Self::SessionExpired => {
                exit_code::AUTH
            }
            Self::PermissionDenied { .. } => exit_code::PERMISSION,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. }
            | Self::ProfileNotFound { .. }
            | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NetworkUnreachable { reason } => CliError::Unreachable { reason },
            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },
            CoreError::SessionExpired => CliError::SessionExpired,
            CoreError::NotAuthenticated => CliError::NotSignedIn {
                profile: "current".into(),
            },
            CoreError::PermissionDenied { message } => CliError::PermissionDenied { message },
            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "webtoon".into(),
                reason: message,
            },
            CoreError::NotFound { message } => CliError::NotFound { message },
            CoreError::Cancelled => CliError::Cancelled,
            CoreError::Api { message, status } => CliError::ApiError {
                status: status.map_or_else(|| "-".into(), |s| s.to_string()),
                message,
            },
            CoreError::Storage { message } => CliError::Storage { message },
            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

impl From<toonsync_core::api::Error> for CliError {
    fn from(err: toonsync_core::api::Error) -> Self {
        CoreError::from(err).into()
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::UnknownProfile { name } => CliError::ProfileNotFound {
                name,
                available: "(none)".into(),
            },
            ConfigError::Serialization(e) => CliError::Validation {
                field: "config".into(),
                reason: format!("failed to serialize config: {e}"),
            },
            ConfigError::Figment(e) => CliError::Config(e),
            ConfigError::Io(e) => CliError::Io(e),
        }
    }
}
