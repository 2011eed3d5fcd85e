use thiserror::Error;

/// Top-level error type for the `ebeco-api` crate.
///
/// Covers every failure mode across the API surface: configuration,
/// authentication, transport, and response parsing. `ebeco-core` maps
/// these into consumer-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Configuration ───────────────────────────────────────────────
    /// Required account configuration is missing or invalid.
    /// Fatal at construction; never retried.
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Authentication ──────────────────────────────────────────────
    /// Login rejected (wrong credentials, expired token rejected again
    /// after re-authentication, etc.)
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The account requires a second authentication factor.
    ///
    /// Unrecoverable automatically -- must be surfaced to the user,
    /// never retried.
    #[error("Account requires two factor authentication")]
    TwoFactorRequired,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout).
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── API ─────────────────────────────────────────────────────────
    /// Structured error reported by the cloud API (non-success HTTP
    /// status or envelope `success == false`).
    #[error("API error (HTTP {status}): {message}")]
    Api {
        message: String,
        code: Option<i64>,
        status: u16,
    },

    // ── Data ────────────────────────────────────────────────────────
    /// The response body did not match the expected shape. Carries the
    /// raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error indicates the bearer token was
    /// rejected and re-authentication might resolve it.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Returns `true` for transient failures an outer retry policy may
    /// reasonably attempt again.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}
