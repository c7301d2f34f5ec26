// ── Core error types ──
//
// User-facing errors from tagsync-core. Consumers never see HTTP status
// codes or JSON parse failures directly; the `From<tagsync_api::Error>`
// impl folds transport-layer errors into these variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach gateway at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Update stream is not connected")]
    Disconnected,

    #[error("Gateway request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Operation rejected by gateway: {message}")]
    Rejected { message: String },

    #[error("Invalid value '{input}' for type {expected}")]
    InvalidValue { input: String, expected: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

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
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<tagsync_api::Error> for CoreError {
    fn from(err: tagsync_api::Error) -> Self {
        match err {
            tagsync_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            tagsync_api::Error::Transport(ref e) => {
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
            tagsync_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            tagsync_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("invalid URL: {e}"),
            },
            tagsync_api::Error::Tls(message) => CoreError::Config {
                message: format!("TLS: {message}"),
            },
            tagsync_api::Error::Rejected { message } => CoreError::Rejected { message },
            tagsync_api::Error::HttpStatus { status } => CoreError::Api {
                message: format!("unexpected HTTP status {status}"),
                status: Some(status),
            },
            tagsync_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: "<stream>".into(),
                reason,
            },
            tagsync_api::Error::WebSocketClosed { code, reason } => CoreError::ConnectionFailed {
                url: "<stream>".into(),
                reason: format!("closed with code {code}: {reason}"),
            },
            tagsync_api::Error::Deserialization { message, body: _ } => CoreError::Api {
                message: format!("unreadable gateway response: {message}"),
                status: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_keep_their_message() {
        let core: CoreError = tagsync_api::Error::Authentication {
            message: "bad token".into(),
        }
        .into();
        assert!(matches!(
            core,
            CoreError::AuthenticationFailed { ref message } if message == "bad token"
        ));
    }

    #[test]
    fn http_status_keeps_code() {
        let core: CoreError = tagsync_api::Error::HttpStatus { status: 503 }.into();
        assert!(matches!(core, CoreError::Api { status: Some(503), .. }));
    }

    #[test]
    fn rejected_maps_to_rejected() {
        let core: CoreError = tagsync_api::Error::Rejected {
            message: "read-only".into(),
        }
        .into();
        assert_eq!(core.to_string(), "Operation rejected by gateway: read-only");
    }
}
