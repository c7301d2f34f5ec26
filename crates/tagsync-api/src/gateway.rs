// Request/response gateway client
//
// Wraps `reqwest::Client` with URL construction for the variable endpoints
// and uniform handling of the `{status, message?}` response shape. Failed
// requests whose body still parses as an error response are returned as
// that response, so callers treat network and application errors alike.

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::protocol::{
    ReadRequest, ReadResponse, StatisticsResponse, WriteRequest, WriteResponse,
};
use crate::transport::TransportConfig;

/// HTTP client for the synchronous variable endpoints.
#[derive(Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl GatewayClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// `base_url` is the gateway root, e.g. `http://10.0.0.5:8080`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url,
            timeout: transport.timeout,
        })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    ///
    /// Timeout errors report the default transport timeout.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url,
            timeout: TransportConfig::default().timeout,
        }
    }

    /// Parse `base` and build a client around an existing `reqwest::Client`.
    pub fn from_reqwest(base: &str, http: reqwest::Client) -> Result<Self, Error> {
        Ok(Self::with_client(http, Url::parse(base)?))
    }

    /// The gateway base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// `POST /api/variables/write`
    pub async fn write(&self, request: &WriteRequest) -> Result<WriteResponse, Error> {
        let url = self.api_url("variables/write")?;
        self.post(url, request).await
    }

    /// `POST /api/variables/read`
    pub async fn read(&self, request: &ReadRequest) -> Result<ReadResponse, Error> {
        let url = self.api_url("variables/read")?;
        self.post(url, request).await
    }

    /// `GET /api/variables/statistics`
    pub async fn statistics(&self) -> Result<StatisticsResponse, Error> {
        let url = self.api_url("variables/statistics")?;
        debug!("GET {}", url);

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| self.send_error(e))?;
        Self::parse_response(resp).await
    }

    // ── Helpers ──────────────────────────────────────────────────────

    /// Build `{base}/api/{path}`, tolerating a trailing slash on the base.
    pub(crate) fn api_url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/api/{path}"))?)
    }

    async fn post<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &impl Serialize,
    ) -> Result<T, Error> {
        debug!("POST {}", url);

        let resp = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.send_error(e))?;

        Self::parse_response(resp).await
    }

    fn send_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::Timeout {
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            Error::Transport(e)
        }
    }

    /// Decode a response body.
    ///
    /// 401 becomes [`Error::Authentication`]. Any other status is decoded
    /// when the body parses; otherwise non-2xx becomes
    /// [`Error::HttpStatus`] and an unparseable 2xx becomes
    /// [`Error::Deserialization`].
    async fn parse_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
        let status = resp.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::Authentication {
                message: "gateway rejected the configured token".into(),
            });
        }

        let body = resp.text().await.map_err(Error::Transport)?;

        match serde_json::from_str::<T>(&body) {
            Ok(parsed) => Ok(parsed),
            Err(_) if !status.is_success() => Err(Error::HttpStatus {
                status: status.as_u16(),
            }),
            Err(e) => Err(Error::Deserialization {
                message: e.to_string(),
                body,
            }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn api_url_joins_without_double_slash() {
        let client =
            GatewayClient::from_reqwest("http://10.0.0.5:8080/", reqwest::Client::new()).unwrap();
        assert_eq!(
            client.api_url("variables/write").unwrap().as_str(),
            "http://10.0.0.5:8080/api/variables/write"
        );
    }

    #[test]
    fn api_url_keeps_path_prefix() {
        let client =
            GatewayClient::from_reqwest("https://scada.local/plant", reqwest::Client::new())
                .unwrap();
        assert_eq!(
            client.api_url("variables/read").unwrap().as_str(),
            "https://scada.local/plant/api/variables/read"
        );
    }
}
