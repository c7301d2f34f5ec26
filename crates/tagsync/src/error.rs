//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use tagsync_config::ConfigError;
use tagsync_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const REJECTED: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach gateway at {url}")]
    #[diagnostic(
        code(tagsync::connection_failed),
        help(
            "Check that the gateway is running and reachable.\n\
             URL: {url}\n\
             Try: tagsync stats --server {url}"
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Update stream did not connect within {seconds}s")]
    #[diagnostic(
        code(tagsync::stream_unavailable),
        help(
            "The request/response endpoints may still work.\n\
             Check the stream URL (stream_url in the profile) and any proxy in between."
        )
    )]
    StreamUnavailable { seconds: u64 },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed")]
    #[diagnostic(
        code(tagsync::auth_failed),
        help(
            "Verify the gateway token.\n\
             Store one with: tagsync config set-token --profile {profile} <TOKEN>"
        )
    )]
    AuthFailed { profile: String },

    // ── Variable operations ──────────────────────────────────────────
    #[error("Write to {variable} failed: {reason}")]
    #[diagnostic(code(tagsync::write_failed))]
    WriteFailed { variable: String, reason: String },

    #[error("Read of {variable} failed: {reason}")]
    #[diagnostic(
        code(tagsync::read_failed),
        help("Check the variable name and device (--device).")
    )]
    ReadFailed { variable: String, reason: String },

    #[error("Toggle of {variable} was reverted: {reason}")]
    #[diagnostic(code(tagsync::toggle_reverted))]
    ToggleReverted { variable: String, reason: String },

    #[error("Pulse on {variable} did not release")]
    #[diagnostic(
        code(tagsync::pulse_incomplete),
        help(
            "The actuator may still be engaged.\n\
             Release it manually: tagsync write {variable} false"
        )
    )]
    PulseIncomplete { variable: String },

    #[error("Gateway {operation} failed: {reason}")]
    #[diagnostic(code(tagsync::request_failed))]
    RequestFailed { operation: String, reason: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(tagsync::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(tagsync::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: tagsync config init --name {name} --server <URL>"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No gateway configured")]
    #[diagnostic(
        code(tagsync::no_config),
        help(
            "Pass --server <URL>, or create a profile with: tagsync config init --server <URL>\n\
             Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(tagsync::config))]
    Config(ConfigError),

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(tagsync::timeout),
        help("Increase timeout with --timeout or check gateway responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to render YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to render TOML: {0}")]
    Toml(#[from] toml::ser::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::StreamUnavailable { .. } => {
                exit_code::CONNECTION
            }
            Self::AuthFailed { .. } => exit_code::AUTH,
            Self::WriteFailed { .. }
            | Self::ToggleReverted { .. }
            | Self::PulseIncomplete { .. }
            | Self::ReadFailed { .. }
            | Self::RequestFailed { .. } => exit_code::REJECTED,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::ProfileNotFound { .. } | Self::NoConfig { .. } => {
                exit_code::USAGE
            }
            Self::Config(_) | Self::Io(_) | Self::Json(_) | Self::Yaml(_) | Self::Toml(_) => {
                exit_code::GENERAL
            }
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::ProfileNotFound { name, available } => CliError::ProfileNotFound {
                name,
                available: if available.is_empty() {
                    "(none)".into()
                } else {
                    available.join(", ")
                },
            },
            other => CliError::Config(other),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed {
                url,
                source: reason.into(),
            },

            CoreError::AuthenticationFailed { message: _ } => CliError::AuthFailed {
                profile: "current".into(),
            },

            CoreError::Disconnected => CliError::ConnectionFailed {
                url: "(stream)".into(),
                source: "update stream is not connected".into(),
            },

            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },

            CoreError::InvalidValue { input, expected } => CliError::Validation {
                field: "value".into(),
                reason: format!("'{input}' is not a valid {expected}"),
            },

            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::Rejected { message } | CoreError::Api { message, status: _ } => {
                CliError::RequestFailed {
                    operation: "request".into(),
                    reason: message,
                }
            }

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
        }
    }
}
