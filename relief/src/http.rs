//! HTTP client abstraction.
//!
//! The download and credential components talk to the network through the
//! [`HttpClient`] trait so that tests can substitute fakes and count
//! outbound requests. [`ReqwestClient`] is the production implementation.

use std::time::Duration;

use crate::error::{Error, Result};

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// A completed HTTP exchange. Transport failures are errors; any received
/// status code, including 4xx and 5xx, is a response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Minimal HTTP operations needed by the elevation pipeline.
pub trait HttpClient: Send + Sync {
    /// GET with a bearer token in the `Authorization` header.
    fn get_with_bearer(&self, url: &str, token: &str) -> Result<HttpResponse>;

    /// GET with HTTP Basic authentication.
    fn get_with_basic(&self, url: &str, username: &str, password: &str) -> Result<HttpResponse>;

    /// POST with HTTP Basic authentication and an empty body.
    fn post_with_basic(&self, url: &str, username: &str, password: &str) -> Result<HttpResponse>;
}

/// Production client backed by a blocking reqwest client.
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Create a client with the default timeout.
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a client with a custom timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config {
                reason: format!("cannot build HTTP client: {e}"),
            })?;

        Ok(Self { client })
    }

    fn execute(&self, request: reqwest::blocking::RequestBuilder) -> Result<HttpResponse> {
        let response = request.send().map_err(|e| Error::Transport {
            reason: e.to_string(),
        })?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .map_err(|e| Error::Transport {
                reason: e.to_string(),
            })?
            .to_vec();

        Ok(HttpResponse { status, body })
    }
}

impl HttpClient for ReqwestClient {
    fn get_with_bearer(&self, url: &str, token: &str) -> Result<HttpResponse> {
        self.execute(self.client.get(url).bearer_auth(token))
    }

    fn get_with_basic(&self, url: &str, username: &str, password: &str) -> Result<HttpResponse> {
        self.execute(self.client.get(url).basic_auth(username, Some(password)))
    }

    fn post_with_basic(&self, url: &str, username: &str, password: &str) -> Result<HttpResponse> {
        self.execute(self.client.post(url).basic_auth(username, Some(password)))
    }
}
