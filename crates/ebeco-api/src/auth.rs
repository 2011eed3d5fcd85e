// Authentication
//
// Bearer-token login against `POST /api/TokenAuth/Authenticate`. The
// login flow bypasses the 401 interception entirely: a rejected login is
// propagated, never retried, so credential failures cannot loop.

use std::fmt;
use std::time::{Duration, Instant};

use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::debug;

use crate::error::Error;
use crate::models::{ApiEnvelope, LoginResponse};
use crate::transport::{Transport, parse_envelope};

const LOGIN_PATH: &str = "/api/TokenAuth/Authenticate";

/// A bearer token paired with its issuance time and advertised lifetime.
///
/// Tokens are immutable once issued; a new login produces a new value
/// that replaces the old one wholesale in the transport's store.
#[derive(Clone)]
pub struct BearerToken {
    access_token: SecretString,
    obtained_at: Instant,
    expires_in: Duration,
}

impl BearerToken {
    pub(crate) fn new(access_token: SecretString, expires_in: Duration) -> Self {
        Self {
            access_token,
            obtained_at: Instant::now(),
            expires_in,
        }
    }

    /// The raw token value for the Authorization header.
    pub(crate) fn bearer(&self) -> &str {
        self.access_token.expose_secret()
    }

    /// When this token was issued.
    pub fn obtained_at(&self) -> Instant {
        self.obtained_at
    }

    /// Advertised token lifetime from the login response.
    pub fn expires_in(&self) -> Duration {
        self.expires_in
    }

    /// Whether the advertised lifetime has elapsed.
    pub fn is_expired(&self) -> bool {
        self.obtained_at.elapsed() >= self.expires_in
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerToken")
            .field("access_token", &"[REDACTED]")
            .field("obtained_at", &self.obtained_at)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Result of a successful login, for callers that want to log or
/// schedule around the token lifetime.
#[derive(Debug, Clone, Copy)]
pub struct LoginOutcome {
    pub expires_in: Duration,
}

impl Transport {
    /// Authenticate with the configured account credentials.
    ///
    /// Exactly one outbound request per call; no retry of any kind
    /// happens inside this method. On success the stored token is
    /// atomically replaced and the issuance time recorded.
    ///
    /// Fails with [`Error::TwoFactorRequired`] when the account needs a
    /// second factor (the token store is left untouched) and with
    /// [`Error::Authentication`] for any other rejection.
    pub async fn login(&self) -> Result<LoginOutcome, Error> {
        debug!(username = %self.username(), "logging in");

        let body = json!({
            "userNameOrEmailAddress": self.username(),
            "password": self.password().expose_secret(),
        });

        let resp = self.send(Method::POST, LOGIN_PATH, Some(&body), None).await?;

        let env: ApiEnvelope<LoginResponse> = match parse_envelope(resp).await {
            Ok(env) => env,
            Err(Error::Api {
                message, status, ..
            }) => {
                return Err(Error::Authentication {
                    message: format!("login failed (HTTP {status}): {message}"),
                });
            }
            Err(other) => return Err(other),
        };

        if !env.success {
            return Err(Error::Authentication {
                message: env
                    .error_message()
                    .unwrap_or("login rejected by remote API")
                    .to_owned(),
            });
        }

        let Some(login) = env.result else {
            return Err(Error::Authentication {
                message: "login response missing result".into(),
            });
        };

        if login.requires_two_factor_verification {
            return Err(Error::TwoFactorRequired);
        }

        let expires_in = Duration::from_secs(login.expire_in_seconds);
        self.store_token(BearerToken::new(login.access_token.into(), expires_in))
            .await;

        debug!(expires_in_secs = expires_in.as_secs(), "login successful");
        Ok(LoginOutcome { expires_in })
    }
}
