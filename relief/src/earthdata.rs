//! Earthdata credential issuer.
//!
//! The SRTMGL1 archive requires a bearer token issued by the Earthdata
//! login API. Tokens are obtained with HTTP Basic credentials and cached
//! until their expiration date passes; at most one token request is in
//! flight per process at a time.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::http::HttpClient;

/// A bearer token together with its advertised expiration date.
#[derive(Debug, Clone, Deserialize)]
pub struct BearerToken {
    /// Opaque token value, sent as `Authorization: Bearer {access_token}`.
    pub access_token: String,
    /// Expiration timestamp as returned by the API.
    pub expiration_date: String,
}

impl BearerToken {
    /// Whether the expiration date parses and lies in the future (UTC).
    /// Unparseable dates count as expired so the token gets refreshed.
    pub fn is_valid(&self) -> bool {
        parse_expiration(&self.expiration_date)
            .map(|expires| expires > Utc::now())
            .unwrap_or(false)
    }
}

/// The API reports expirations in a handful of shapes depending on the
/// endpoint: RFC 3339, a bare date, or a US-style date.
fn parse_expiration(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%d", "%m/%d/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return date
                .and_hms_opt(0, 0, 0)
                .map(|dt| Utc.from_utc_datetime(&dt));
        }
    }

    None
}

/// Issues and caches Earthdata bearer tokens.
pub struct EarthdataApi {
    base_url: String,
    username: String,
    password: String,
    http: Arc<dyn HttpClient>,
    probe_token_list: bool,
    // Held across the network call so concurrent callers coalesce into a
    // single token request.
    cached: Mutex<Option<BearerToken>>,
}

impl EarthdataApi {
    /// Create an issuer for the given API base URL and Basic credentials.
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        http: Arc<dyn HttpClient>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
            http,
            probe_token_list: false,
            cached: Mutex::new(None),
        }
    }

    /// Also probe `GET /users/tokens` for a still-valid previously issued
    /// token before requesting a fresh one.
    pub fn with_token_listing(mut self) -> Self {
        self.probe_token_list = true;
        self
    }

    /// Return a valid bearer token, reusing the cached one when possible.
    pub fn token(&self) -> Result<BearerToken> {
        let mut cached = self.cached.lock().unwrap();

        if let Some(token) = cached.as_ref() {
            if token.is_valid() {
                return Ok(token.clone());
            }
        }

        if self.probe_token_list {
            match self.list_existing_token() {
                Ok(Some(token)) => {
                    *cached = Some(token.clone());
                    return Ok(token);
                }
                Ok(None) => {}
                // A failed probe is not fatal; fall through to issuance.
                Err(e) => tracing::debug!(error = %e, "token listing probe failed"),
            }
        }

        let token = self.request_token()?;
        tracing::info!("issued a new Earthdata bearer token");
        *cached = Some(token.clone());

        Ok(token)
    }

    fn list_existing_token(&self) -> Result<Option<BearerToken>> {
        let url = format!("{}/users/tokens", self.base_url);
        let response = self
            .http
            .get_with_basic(&url, &self.username, &self.password)?;

        if !response.is_success() {
            return Err(Error::Auth {
                status: response.status,
            });
        }

        let tokens: Vec<BearerToken> =
            serde_json::from_slice(&response.body).map_err(|e| Error::Decode {
                reason: format!("token list: {e}"),
            })?;

        Ok(tokens.into_iter().find(BearerToken::is_valid))
    }

    fn request_token(&self) -> Result<BearerToken> {
        let url = format!("{}/users/token", self.base_url);
        let response = self
            .http
            .post_with_basic(&url, &self.username, &self.password)?;

        if !response.is_success() {
            return Err(Error::Auth {
                status: response.status,
            });
        }

        serde_json::from_slice(&response.body).map_err(|e| Error::Decode {
            reason: format!("token response: {e}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::tests::MockHttpClient;
    use std::sync::atomic::Ordering;

    const FRESH_TOKEN: &str = r#"{"access_token": "T1", "expiration_date": "2099-01-01"}"#;

    #[test]
    fn test_token_is_cached_until_expiration() {
        let http = Arc::new(MockHttpClient::new().route("/users/token", 200, FRESH_TOKEN));
        let api = EarthdataApi::new("http://earthdata.test/api", "user", "pass", http.clone());

        let first = api.token().unwrap();
        let second = api.token().unwrap();

        assert_eq!(first.access_token, "T1");
        assert_eq!(second.access_token, "T1");
        assert_eq!(http.post_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_expired_cache_triggers_reissue() {
        let http = Arc::new(MockHttpClient::new().route(
            "/users/token",
            200,
            r#"{"access_token": "T2", "expiration_date": "2001-01-01"}"#,
        ));
        let api = EarthdataApi::new("http://earthdata.test/api", "user", "pass", http.clone());

        api.token().unwrap();
        api.token().unwrap();

        // The returned token is always expired, so each call re-issues.
        assert_eq!(http.post_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_token_listing_probe_is_preferred() {
        let listing = r#"[
            {"access_token": "OLD", "expiration_date": "2001-01-01"},
            {"access_token": "LISTED", "expiration_date": "2099-06-30"}
        ]"#;
        let http = Arc::new(
            MockHttpClient::new()
                .route("/users/tokens", 200, listing)
                .route("/users/token", 200, FRESH_TOKEN),
        );
        let api = EarthdataApi::new("http://earthdata.test/api", "user", "pass", http.clone())
            .with_token_listing();

        let token = api.token().unwrap();

        assert_eq!(token.access_token, "LISTED");
        assert_eq!(http.post_count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_empty_listing_falls_back_to_issuance() {
        let http = Arc::new(
            MockHttpClient::new()
                .route("/users/tokens", 200, "[]")
                .route("/users/token", 200, FRESH_TOKEN),
        );
        let api = EarthdataApi::new("http://earthdata.test/api", "user", "pass", http.clone())
            .with_token_listing();

        let token = api.token().unwrap();

        assert_eq!(token.access_token, "T1");
        assert_eq!(http.post_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_non_200_is_auth_error() {
        let http = Arc::new(MockHttpClient::new().route("/users/token", 401, Vec::new()));
        let api = EarthdataApi::new("http://earthdata.test/api", "user", "bad", http);

        assert!(matches!(api.token(), Err(Error::Auth { status: 401 })));
    }

    #[test]
    fn test_unparseable_body_is_decode_error() {
        let http = Arc::new(MockHttpClient::new().route("/users/token", 200, "not json"));
        let api = EarthdataApi::new("http://earthdata.test/api", "user", "pass", http);

        assert!(matches!(api.token(), Err(Error::Decode { .. })));
    }

    #[test]
    fn test_expiration_formats() {
        for raw in ["2099-01-01", "01/01/2099", "2099-01-01T00:00:00Z"] {
            let token = BearerToken {
                access_token: "t".to_string(),
                expiration_date: raw.to_string(),
            };
            assert!(token.is_valid(), "{raw} should be valid");
        }

        for raw in ["2001-01-01", "garbage", ""] {
            let token = BearerToken {
                access_token: "t".to_string(),
                expiration_date: raw.to_string(),
            };
            assert!(!token.is_valid(), "{raw} should be invalid");
        }
    }
}
