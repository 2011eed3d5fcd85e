// API response types
//
// Models for the Ebeco Connect cloud API. Every endpoint wraps its payload
// in the `ApiEnvelope<T>` envelope. Device fields are deserialized strictly
// on purpose: the reconciliation layer replaces its snapshot wholesale on
// every refresh, so a missing field must surface as a protocol-shape error
// rather than silently keeping a stale value.

use serde::{Deserialize, Serialize};

// ── Response Envelope ────────────────────────────────────────────────

/// Standard Ebeco Connect response envelope.
///
/// Every endpoint wraps its payload:
/// ```json
/// { "result": ..., "success": true, "error": null, "unAuthorizedRequest": false }
/// ```
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEnvelope<T> {
    pub result: Option<T>,
    pub success: bool,
    pub error: Option<ApiErrorBody>,
    #[serde(default)]
    pub un_authorized_request: bool,
}

impl<T> ApiEnvelope<T> {
    /// The error message reported inside the envelope, if any.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().and_then(|e| e.message.as_deref())
    }

    /// The numeric error code reported inside the envelope, if any.
    pub fn error_code(&self) -> Option<i64> {
        self.error.as_ref().and_then(|e| e.code)
    }
}

/// Structured error reported inside the envelope on failures.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
}

// ── Authentication ───────────────────────────────────────────────────

/// Successful login payload from `POST /api/TokenAuth/Authenticate`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub expire_in_seconds: u64,
    pub requires_two_factor_verification: bool,
}

// ── Device ───────────────────────────────────────────────────────────

/// Thermostat object from `GET /api/services/app/Devices/GetUserDevices`.
///
/// All fields are required: the envelope either delivers a complete
/// point-in-time copy of remote state or the response is rejected.
/// `errorMessage` may be null (no current error) but must be present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Thermostat id, assigned by the remote system. Stable identity.
    pub id: i64,
    /// The given name of the thermostat.
    pub display_name: String,
    /// Whether the thermostat is switched on.
    pub power_on: bool,
    /// Program currently set: `Manual`, `Week`, or `Timer`.
    pub selected_program: String,
    /// State of the current program: `Standby`, `Active`, or `Timer`.
    pub program_state: String,
    /// Target temperature (°C) until the next program event, or fixed
    /// when on the manual program.
    pub temperature_set: f64,
    /// Current temperature, floor sensor (°C).
    pub temperature_floor: f64,
    /// Current temperature, room sensor (°C).
    pub temperature_room: f64,
    /// Whether the thermostat reports an error or appears offline.
    pub has_error: bool,
    /// Description of the current error, if any.
    pub error_message: Option<String>,
}

/// Complete write intent for `PUT /api/services/app/Devices/UpdateUserDevice`.
///
/// The update endpoint always receives the full controllable state, even
/// when only one field changed -- the value for the unchanged field is
/// taken from the last known snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceUpdate {
    /// Thermostat id.
    pub id: i64,
    /// Target temperature (°C).
    pub temperature_set: f64,
    /// Turn the thermostat on or off.
    pub power_on: bool,
}
