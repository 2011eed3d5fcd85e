// HTTP transport with transparent re-authentication
//
// Owns the reqwest client, the account credentials, and the bearer-token
// store for a single Ebeco Connect account. Every authenticated request
// routes through `request()`, which applies the 401 interception rule:
// re-login once (serialized process-wide), retry the original request
// once with the fresh token, and never loop beyond that.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use url::Url;

use crate::auth::BearerToken;
use crate::error::Error;
use crate::models::ApiEnvelope;

/// Production cloud endpoint, used when no host override is configured.
pub const DEFAULT_API_HOST: &str = "https://ebecoconnect.com";

/// Account configuration for a single Ebeco Connect account.
#[derive(Debug, Clone)]
pub struct AccountConfig {
    /// Account username (email address).
    pub username: String,
    /// Account password.
    pub password: SecretString,
    /// API host override. `None` selects [`DEFAULT_API_HOST`].
    pub api_host: Option<Url>,
    /// Request timeout.
    pub timeout: Duration,
}

impl AccountConfig {
    /// Create a config for the production cloud endpoint with the
    /// default request timeout.
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
            api_host: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// HTTP transport for one account, shared by all typed clients.
///
/// Cheaply cloneable via `Arc`. There is exactly one `Transport` (and
/// therefore one credential store) per account -- per-device consumers
/// all route through the same instance.
#[derive(Clone)]
pub struct Transport {
    inner: Arc<TransportInner>,
}

struct TransportInner {
    http: reqwest::Client,
    base_url: Url,
    username: String,
    password: SecretString,
    /// Current bearer token. Replaced wholesale on every successful
    /// login so readers never observe a torn token/issuance pair.
    token: RwLock<Option<BearerToken>>,
    /// Serializes re-authentication: a second request hitting 401 while
    /// a login is in flight waits here and reuses the resulting token.
    relogin: Mutex<()>,
}

impl Transport {
    /// Build a transport from account configuration.
    ///
    /// Validates that both username and password are present (fatal
    /// `Error::Config` otherwise) and falls back to [`DEFAULT_API_HOST`]
    /// when no host override was supplied. All requests carry the fixed
    /// tenant and content-type headers.
    pub fn new(config: AccountConfig) -> Result<Self, Error> {
        if config.username.trim().is_empty() {
            return Err(Error::Config {
                message: "username is required".into(),
            });
        }
        if config.password.expose_secret().is_empty() {
            return Err(Error::Config {
                message: "password is required".into(),
            });
        }

        let base_url = match config.api_host {
            Some(url) => url,
            None => Url::parse(DEFAULT_API_HOST)?,
        };

        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("abp.tenantid"),
            HeaderValue::from_static("1"),
        );
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(Error::Transport)?;

        Ok(Self {
            inner: Arc::new(TransportInner {
                http,
                base_url,
                username: config.username,
                password: config.password,
                token: RwLock::new(None),
                relogin: Mutex::new(()),
            }),
        })
    }

    /// The configured API base URL.
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// The current bearer token, if a login has succeeded.
    pub async fn bearer_token(&self) -> Option<BearerToken> {
        self.inner.token.read().await.clone()
    }

    pub(crate) fn username(&self) -> &str {
        &self.inner.username
    }

    pub(crate) fn password(&self) -> &SecretString {
        &self.inner.password
    }

    /// Replace the stored token. The `Option` is swapped in one write
    /// so concurrent readers see either the old pair or the new one.
    pub(crate) async fn store_token(&self, token: BearerToken) {
        *self.inner.token.write().await = Some(token);
    }

    // ── Request execution ────────────────────────────────────────────

    /// Send a GET request and return the parsed envelope.
    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<ApiEnvelope<T>, Error> {
        self.request::<T, ()>(Method::GET, path, None).await
    }

    /// Send a PUT request with a JSON body and return the parsed envelope.
    pub(crate) async fn put<T, B>(&self, path: &str, body: &B) -> Result<ApiEnvelope<T>, Error>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized + Sync,
    {
        self.request(Method::PUT, path, Some(body)).await
    }

    /// Execute an authenticated request with the 401 interception rule.
    ///
    /// Any status other than 401 is parsed and returned unchanged. On a
    /// 401, re-authentication runs exactly once (serialized across
    /// concurrent requests) and the original request is resent exactly
    /// once with the fresh token. A second 401 on the retry is surfaced
    /// as an authentication failure -- never another re-auth. A failed
    /// re-login propagates the login failure instead of the original 401.
    async fn request<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<ApiEnvelope<T>, Error>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized + Sync,
    {
        let seen = self.bearer_token().await;
        let resp = self.send(method.clone(), path, body, seen.as_ref()).await?;

        if resp.status() != StatusCode::UNAUTHORIZED {
            return parse_envelope(resp).await;
        }

        debug!(path, "request unauthorized; re-authenticating");
        let fresh = self
            .reauthenticate(seen.map(|t| t.obtained_at()))
            .await?;

        let retry = self.send(method, path, body, Some(&fresh)).await?;
        if retry.status() == StatusCode::UNAUTHORIZED {
            return Err(Error::Authentication {
                message: format!("{path} rejected again after re-authentication"),
            });
        }
        parse_envelope(retry).await
    }

    /// Raw send: builds the URL, attaches the Authorization header when a
    /// token is supplied, and performs no interception. The login flow
    /// uses this directly so a failing login is never re-authenticated.
    pub(crate) async fn send<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        token: Option<&BearerToken>,
    ) -> Result<reqwest::Response, Error>
    where
        B: Serialize + ?Sized + Sync,
    {
        let url = self.inner.base_url.join(path)?;
        debug!("{method} {url}");

        let mut req = self.inner.http.request(method, url);
        if let Some(token) = token {
            req = req.bearer_auth(token.bearer());
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        req.send().await.map_err(Error::Transport)
    }

    /// Serialized re-authentication.
    ///
    /// `seen` is the issuance time of the token the failing request
    /// carried (`None` if it carried none). If the store already holds a
    /// different token by the time the re-login lock is acquired, another
    /// request completed the login first -- that token is reused rather
    /// than issuing a duplicate login.
    async fn reauthenticate(&self, seen: Option<Instant>) -> Result<BearerToken, Error> {
        let _guard = self.inner.relogin.lock().await;

        if let Some(current) = self.bearer_token().await {
            if seen != Some(current.obtained_at()) {
                debug!("reusing token refreshed by a concurrent request");
                return Ok(current);
            }
        }

        self.login().await?;
        self.bearer_token()
            .await
            .ok_or_else(|| Error::Authentication {
                message: "login completed without storing a token".into(),
            })
    }
}

/// Parse the response envelope, mapping non-success statuses to
/// `Error::Api` (with the envelope's structured error when present).
///
/// Envelope-level failure (`success == false` on a 200) is NOT an error
/// here -- the typed clients decide what the flag means per operation.
pub(crate) async fn parse_envelope<T: DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<ApiEnvelope<T>, Error> {
    let status = resp.status();
    let body = resp.text().await.map_err(Error::Transport)?;

    if !status.is_success() {
        // Failure statuses usually still carry the envelope; pull the
        // structured error out when possible.
        if let Ok(env) = serde_json::from_str::<ApiEnvelope<serde_json::Value>>(&body) {
            if let Some(err) = env.error {
                return Err(Error::Api {
                    message: err.message.unwrap_or_else(|| format!("HTTP {status}")),
                    code: err.code,
                    status: status.as_u16(),
                });
            }
        }
        return Err(Error::Api {
            message: if body.is_empty() {
                format!("HTTP {status}")
            } else {
                body
            },
            code: None,
            status: status.as_u16(),
        });
    }

    serde_json::from_str(&body).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn valid_config() -> AccountConfig {
        AccountConfig::new("hello@example.com", SecretString::from("world".to_owned()))
    }

    #[test]
    fn missing_username_is_a_config_error() {
        let config = AccountConfig::new("", SecretString::from("world".to_owned()));
        let result = Transport::new(config);
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn missing_password_is_a_config_error() {
        let config = AccountConfig::new("hello@example.com", SecretString::from(String::new()));
        let result = Transport::new(config);
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn default_host_is_configured_when_none_supplied() {
        let transport = Transport::new(valid_config()).unwrap();
        assert_eq!(transport.base_url().as_str(), "https://ebecoconnect.com/");
    }

    #[test]
    fn host_override_is_respected() {
        let mut config = valid_config();
        config.api_host = Some(Url::parse("https://staging.example.com").unwrap());
        let transport = Transport::new(config).unwrap();
        assert_eq!(transport.base_url().host_str(), Some("staging.example.com"));
    }
}
