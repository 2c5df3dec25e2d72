//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use ferry_config::ConfigError;
use ferry_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    /// The run finished but at least one phase aborted or was blocked.
    pub const PHASE_FAILED: i32 = 9;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the platform at {url}: {reason}")]
    #[diagnostic(
        code(ferry::connection_failed),
        help("Check the profile's api_url and your network connection.")
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(ferry::timeout),
        help("Raise `timeout` in the profile or in [defaults].")
    )]
    Timeout { seconds: u64 },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(ferry::auth_failed),
        help("Verify the profile's token (or the variable named by token_env).")
    )]
    AuthFailed { message: String },

    #[error("No token configured for profile '{profile}'")]
    #[diagnostic(
        code(ferry::no_credentials),
        help("Set `token_env` (recommended) or `token` under [profiles.{profile}].")
    )]
    NoCredentials { profile: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(ferry::profile_not_found),
        help("Available profiles: {available}\nConfig file: {path}")
    )]
    ProfileNotFound {
        name: String,
        available: String,
        path: String,
    },

    #[error(transparent)]
    #[diagnostic(code(ferry::config))]
    Config(ConfigError),

    // ── Sync ─────────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(code(ferry::not_found))]
    NotFound {
        resource_type: String,
        identifier: String,
    },

    #[error("Cannot read archive {path}: {message}")]
    #[diagnostic(
        code(ferry::archive),
        help("Point --archive at the extracted backup directory.")
    )]
    Archive { path: String, message: String },

    #[error("API error: {message}")]
    #[diagnostic(code(ferry::api_error))]
    ApiError { message: String },

    #[error("{failed} phase(s) did not complete")]
    #[diagnostic(
        code(ferry::phase_failed),
        help("Re-run with -v to see which listing failed; completed phases are idempotent.")
    )]
    PhaseFailed { failed: usize },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(ferry::validation))]
    Validation { field: String, reason: String },

    #[error("Operation '{action}' requires confirmation")]
    #[diagnostic(
        code(ferry::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render output: {0}")]
    #[diagnostic(code(ferry::render))]
    Render(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::PhaseFailed { .. } => exit_code::PHASE_FAILED,
            Self::Validation { .. } | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => Self::ConnectionFailed { url, reason },
            CoreError::AuthenticationFailed { message } => Self::AuthFailed { message },
            CoreError::Timeout { timeout_secs } => Self::Timeout {
                seconds: timeout_secs,
            },
            CoreError::NotFound {
                entity_type,
                identifier,
            } => Self::NotFound {
                resource_type: entity_type,
                identifier,
            },
            CoreError::Archive { path, message } => Self::Archive { path, message },
            CoreError::Config { message } => Self::Validation {
                field: "config".into(),
                reason: message,
            },
            other => Self::ApiError {
                message: other.to_string(),
            },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => Self::NoCredentials { profile },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_failure_has_its_own_exit_code() {
        let err = CliError::PhaseFailed { failed: 2 };
        assert_eq!(err.exit_code(), exit_code::PHASE_FAILED);
    }

    #[test]
    fn core_errors_keep_their_category() {
        let err: CliError = CoreError::AuthenticationFailed {
            message: "bad token".into(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::AUTH);

        let err: CliError = CoreError::Timeout { timeout_secs: 30 }.into();
        assert_eq!(err.exit_code(), exit_code::TIMEOUT);

        let err: CliError = CoreError::Consistency {
            message: "dup".into(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::GENERAL);
    }
}
