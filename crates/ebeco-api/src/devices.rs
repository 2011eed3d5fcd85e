// Device endpoints
//
// Typed operations over the shared transport. Both calls inherit the
// transparent 401 re-authentication from `Transport::request`.

use tracing::debug;

use crate::error::Error;
use crate::models::{ApiEnvelope, Device, DeviceUpdate};
use crate::transport::Transport;

const DEVICES_PATH: &str = "/api/services/app/Devices/GetUserDevices";
const UPDATE_PATH: &str = "/api/services/app/Devices/UpdateUserDevice";

/// Typed device operations for one account.
///
/// Thin layer over a shared [`Transport`] -- cloning the transport is
/// cheap and every clone reads the same credential store.
#[derive(Clone)]
pub struct DeviceClient {
    transport: Transport,
}

impl DeviceClient {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    /// The underlying transport (for auth flows and diagnostics).
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// List all thermostats on the account.
    ///
    /// `GET /api/services/app/Devices/GetUserDevices`
    ///
    /// Returns the envelope's `result` in the order the remote system
    /// supplied it -- callers relying on position get remote order,
    /// never a re-sort.
    pub async fn list_devices(&self) -> Result<Vec<Device>, Error> {
        debug!("listing devices");
        let env: ApiEnvelope<Vec<Device>> = self.transport.get(DEVICES_PATH).await?;

        if !env.success {
            return Err(Error::Api {
                message: env
                    .error_message()
                    .unwrap_or("device list rejected by remote API")
                    .to_owned(),
                code: env.error_code(),
                status: 200,
            });
        }

        env.result.ok_or_else(|| Error::Deserialization {
            message: "device list response missing `result`".into(),
            body: String::new(),
        })
    }

    /// Update the controllable state of one thermostat.
    ///
    /// `PUT /api/services/app/Devices/UpdateUserDevice`
    ///
    /// The returned bool is the envelope's own `success` flag. A 200
    /// response alone does not mean the write was applied -- callers
    /// must check the flag.
    pub async fn update_device(&self, update: &DeviceUpdate) -> Result<bool, Error> {
        debug!(device_id = update.id, "updating device state");
        let env: ApiEnvelope<serde_json::Value> =
            self.transport.put(UPDATE_PATH, update).await?;
        Ok(env.success)
    }
}
