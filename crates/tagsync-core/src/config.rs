// ── Runtime connection configuration ──
//
// These types describe *how* to reach a gateway. They carry the token and
// connection tuning but never touch disk. The CLI builds a `SyncConfig`
// and hands it to `Session::start`.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::error::CoreError;

/// Device used when an operation does not name one.
pub const DEFAULT_DEVICE_ID: &str = "plc_001";

/// Path of the update stream, relative to the gateway root.
pub const STREAM_PATH: &str = "ws/variables";

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification (self-signed certs on plant networks).
    DangerAcceptInvalid,
}

/// Backoff settings for the update stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectSettings {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// `None` retries forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

/// Configuration for one gateway connection.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Gateway root (e.g. `http://10.0.0.5:8080`).
    pub server_url: Url,
    /// Explicit stream URL. Derived from `server_url` when `None`.
    pub stream_url: Option<Url>,
    /// Device for operations that omit one.
    pub default_device_id: String,
    pub tls: TlsVerification,
    /// Request timeout for the gateway endpoints.
    pub timeout: Duration,
    /// Bearer token sent on both channels.
    pub auth_token: Option<SecretString>,
    pub reconnect: ReconnectSettings,
    /// Open the update stream. One-shot CLI commands turn this off.
    pub stream_enabled: bool,
}

impl SyncConfig {
    /// Defaults for everything except the gateway address.
    pub fn new(server_url: Url) -> Self {
        Self {
            server_url,
            stream_url: None,
            default_device_id: DEFAULT_DEVICE_ID.into(),
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            auth_token: None,
            reconnect: ReconnectSettings::default(),
            stream_enabled: true,
        }
    }

    /// The stream endpoint: the explicit URL, or `ws(s)://{host}/ws/variables`.
    pub fn resolved_stream_url(&self) -> Result<Url, CoreError> {
        if let Some(url) = &self.stream_url {
            return Ok(url.clone());
        }

        let scheme = match self.server_url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(CoreError::Config {
                    message: format!("cannot derive a stream URL from scheme '{other}'"),
                });
            }
        };

        let root = self.server_url.as_str().trim_end_matches('/');
        let rest = root
            .split_once("://")
            .map_or(root, |(_, rest)| rest);

        Url::parse(&format!("{scheme}://{rest}/{STREAM_PATH}")).map_err(|e| CoreError::Config {
            message: format!("invalid stream URL: {e}"),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config(url: &str) -> SyncConfig {
        SyncConfig::new(Url::parse(url).unwrap())
    }

    #[test]
    fn derives_ws_from_http() {
        let url = config("http://10.0.0.5:8080").resolved_stream_url().unwrap();
        assert_eq!(url.as_str(), "ws://10.0.0.5:8080/ws/variables");
    }

    #[test]
    fn derives_wss_from_https_with_prefix() {
        let url = config("https://scada.local/plant/").resolved_stream_url().unwrap();
        assert_eq!(url.as_str(), "wss://scada.local/plant/ws/variables");
    }

    #[test]
    fn explicit_stream_url_wins() {
        let mut cfg = config("http://10.0.0.5:8080");
        cfg.stream_url = Some(Url::parse("ws://10.0.0.6:9000/live").unwrap());
        assert_eq!(
            cfg.resolved_stream_url().unwrap().as_str(),
            "ws://10.0.0.6:9000/live"
        );
    }

    #[test]
    fn unknown_scheme_is_rejected() {
        assert!(config("ftp://10.0.0.5").resolved_stream_url().is_err());
    }

    #[test]
    fn defaults_target_first_plc() {
        let cfg = config("http://localhost:8080");
        assert_eq!(cfg.default_device_id, "plc_001");
        assert_eq!(cfg.timeout, Duration::from_secs(30));
        assert!(cfg.stream_enabled);
    }
}
