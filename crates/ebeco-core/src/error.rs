// ── Core error types ──
//
// Consumer-facing errors from ebeco-core. The host collaborator never
// sees HTTP status codes or JSON parse failures directly; the
// `From<ebeco_api::Error>` impl translates transport-layer errors into
// domain-appropriate variants.

use thiserror::Error;

/// Error type surfaced to the host collaborator.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Configuration ───────────────────────────────────────────────
    /// Required configuration is missing or invalid. Fatal at
    /// construction; never retried.
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Authentication ──────────────────────────────────────────────
    /// Login rejected (bad credentials, expired session).
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// The account requires a second authentication factor. Must be
    /// surfaced to the user; automatic recovery is impossible.
    #[error("Account requires two factor authentication")]
    TwoFactorRequired,

    // ── Device operations ───────────────────────────────────────────
    /// The remote device list no longer contains a tracked device.
    /// Surfaced upward; the reconciler keeps operating.
    #[error("Device not found: {device_id}")]
    DeviceNotFound { device_id: i64 },

    /// The remote system accepted the HTTP call but reported that the
    /// write was not applied. Local state is left unchanged.
    #[error("Update to device state was not successful (device {device_id})")]
    WriteRejected { device_id: i64 },

    // ── API errors (wrapped, not exposed raw) ───────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<ebeco_api::Error> for CoreError {
    fn from(err: ebeco_api::Error) -> Self {
        match err {
            ebeco_api::Error::Config { message } => CoreError::Config { message },
            ebeco_api::Error::TwoFactorRequired => CoreError::TwoFactorRequired,
            ebeco_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            ebeco_api::Error::Transport(ref e) => CoreError::Api {
                message: e.to_string(),
                status: e.status().map(|s| s.as_u16()),
            },
            ebeco_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            ebeco_api::Error::Api {
                message, status, ..
            } => CoreError::Api {
                message,
                status: Some(status),
            },
            ebeco_api::Error::Deserialization { message, body: _ } => CoreError::Api {
                message: format!("Deserialization error: {message}"),
                status: None,
            },
        }
    }
}
