use thiserror::Error;

/// Top-level error type for the `tagsync-api` crate.
///
/// Covers every failure mode across both channels: the HTTP
/// request/response gateway and the websocket update stream.
/// `tagsync-core` folds these into failure indicators for callers.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Server rejected the bearer token (HTTP 401).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Application ─────────────────────────────────────────────────
    /// The server answered with `{status: "error", message}`.
    #[error("Server rejected request: {message}")]
    Rejected { message: String },

    /// Unexpected HTTP status without a parseable error body.
    #[error("Unexpected HTTP status {status}")]
    HttpStatus { status: u16 },

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket closed unexpectedly.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error indicates the token was refused.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } | Self::WebSocketConnect(_) => true,
            _ => false,
        }
    }

    /// Returns `true` if the server itself refused the operation,
    /// as opposed to the request never reaching it.
    pub fn is_application_error(&self) -> bool {
        matches!(self, Self::Rejected { .. } | Self::HttpStatus { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_transient_errors() {
        assert!(Error::Timeout { timeout_secs: 5 }.is_transient());
        assert!(Error::WebSocketConnect("refused".into()).is_transient());
        assert!(!Error::Rejected { message: "unknown variable".into() }.is_transient());
    }

    #[test]
    fn classifies_application_errors() {
        assert!(Error::Rejected { message: "x".into() }.is_application_error());
        assert!(Error::HttpStatus { status: 500 }.is_application_error());
        assert!(!Error::Tls("bad cert".into()).is_application_error());
        assert!(Error::Authentication { message: "nope".into() }.is_auth_error());
    }
}
