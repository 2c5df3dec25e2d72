// ── Core error types ──
//
// Domain errors from ferry-core. Consumers never see raw HTTP status
// handling or JSON parse failures; the `From<ferry_api::Error>` impl
// translates transport-layer errors into these variants.

use thiserror::Error;

/// Unified error type for the engine.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach platform at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Rate limited by the platform (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Entity not found: {entity_type} with id {identifier}")]
    NotFound {
        entity_type: String,
        identifier: String,
    },

    /// Source and target disagree in a way that makes the item unsafe to
    /// write (duplicate correlation key, missing secondary token).
    #[error("Consistency violation: {message}")]
    Consistency { message: String },

    #[error("Archive error at {path}: {message}")]
    Archive { path: String, message: String },

    #[error("Script error: {message}")]
    Script { message: String },

    /// The entity exists on the target, but a later step of the same item
    /// failed. Carries the new id so references to it still resolve.
    #[error("{source} (entity kept as {target_id})")]
    PartialWrite {
        source_id: String,
        target_id: String,
        source: Box<CoreError>,
    },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn consistency(message: impl Into<String>) -> Self {
        Self::Consistency {
            message: message.into(),
        }
    }

    /// Wrap the failure of a step that ran after `target_id` was written.
    pub(crate) fn partial(
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        err: impl Into<CoreError>,
    ) -> Self {
        Self::PartialWrite {
            source_id: source_id.into(),
            target_id: target_id.into(),
            source: Box::new(err.into()),
        }
    }

    pub(crate) fn archive(path: impl std::fmt::Display, message: impl std::fmt::Display) -> Self {
        Self::Archive {
            path: path.to_string(),
            message: message.to_string(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<ferry_api::Error> for CoreError {
    fn from(err: ferry_api::Error) -> Self {
        match err {
            ferry_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            ferry_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            ferry_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            ferry_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            ferry_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            ferry_api::Error::RateLimited { retry_after_secs } => {
                CoreError::RateLimited { retry_after_secs }
            }
            ferry_api::Error::Api { status: 404, message } => CoreError::NotFound {
                entity_type: "resource".into(),
                identifier: message,
            },
            ferry_api::Error::Api { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            ferry_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
            ferry_api::Error::MissingField { field, context } => {
                CoreError::consistency(format!("{context} response lacks '{field}'"))
            }
        }
    }
}
