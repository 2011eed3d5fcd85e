// ── Per-device state reconciliation ──
//
// Each reconciler owns exactly one device's snapshot. One async mutex
// covers both refreshes and writes: a write issued while a refresh is in
// flight is serialized after it, so a refresh can never overwrite a
// just-issued write with stale data, and a write is never computed
// against a half-updated snapshot.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use ebeco_api::{DeviceClient, DeviceUpdate};

use crate::error::CoreError;
use crate::model::{StateDelta, ThermostatState};

/// Owns the last-known snapshot of one thermostat and serializes all
/// state transitions against it.
///
/// Cheaply cloneable; all clones share the same snapshot and lock.
#[derive(Clone)]
pub struct DeviceReconciler {
    inner: Arc<ReconcilerInner>,
}

struct ReconcilerInner {
    device_id: i64,
    client: DeviceClient,
    include_off_option: bool,
    state: Mutex<ReconcilerState>,
}

struct ReconcilerState {
    current: ThermostatState,
    last_applied: Option<DeviceUpdate>,
}

impl DeviceReconciler {
    /// Seed a reconciler with the discovery snapshot. Called once per
    /// device after discovery; there is exactly one reconciler per
    /// device id.
    pub fn new(initial: ThermostatState, client: DeviceClient, include_off_option: bool) -> Self {
        Self {
            inner: Arc::new(ReconcilerInner {
                device_id: initial.id,
                client,
                include_off_option,
                state: Mutex::new(ReconcilerState {
                    current: initial,
                    last_applied: None,
                }),
            }),
        }
    }

    pub fn device_id(&self) -> i64 {
        self.inner.device_id
    }

    /// The last confirmed snapshot.
    pub async fn current(&self) -> ThermostatState {
        self.inner.state.lock().await.current.clone()
    }

    /// The most recent successfully applied write intent, if any.
    pub async fn last_applied(&self) -> Option<DeviceUpdate> {
        self.inner.state.lock().await.last_applied.clone()
    }

    // ── Refresh ──────────────────────────────────────────────────────

    /// Fetch the device's remote state and replace the local snapshot
    /// wholesale, returning the changed fields.
    ///
    /// Fails with [`CoreError::DeviceNotFound`] when the remote list no
    /// longer contains this device -- the snapshot is left untouched and
    /// the reconciler keeps operating.
    pub async fn refresh(&self) -> Result<StateDelta, CoreError> {
        let mut state = self.inner.state.lock().await;
        self.refresh_locked(&mut state).await
    }

    /// Non-blocking refresh for the poll timer: if a refresh or write is
    /// already in flight, the tick is skipped rather than queued, so a
    /// slow remote cannot build an unbounded backlog.
    pub async fn refresh_if_idle(&self) -> Option<Result<StateDelta, CoreError>> {
        let Ok(mut state) = self.inner.state.try_lock() else {
            debug!(
                device_id = self.inner.device_id,
                "refresh already in flight; skipping tick"
            );
            return None;
        };
        Some(self.refresh_locked(&mut state).await)
    }

    async fn refresh_locked(&self, state: &mut ReconcilerState) -> Result<StateDelta, CoreError> {
        let devices = self.inner.client.list_devices().await?;

        let Some(device) = devices.into_iter().find(|d| d.id == self.inner.device_id) else {
            return Err(CoreError::DeviceNotFound {
                device_id: self.inner.device_id,
            });
        };

        let next = ThermostatState::from(device);
        let delta = next.delta_from(&state.current);
        state.current = next;
        Ok(delta)
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Turn the thermostat on or off.
    ///
    /// With the off option disabled, `false` is not a controllable
    /// intent: the request is ignored and no write is issued.
    pub async fn set_power(&self, on: bool) -> Result<(), CoreError> {
        if !self.inner.include_off_option && !on {
            debug!(
                device_id = self.inner.device_id,
                "off option disabled; ignoring power-off request"
            );
            return Ok(());
        }

        let mut state = self.inner.state.lock().await;
        let intent = DeviceUpdate {
            id: self.inner.device_id,
            temperature_set: state.current.target_temperature,
            power_on: on,
        };
        self.apply(&mut state, intent).await
    }

    /// Set the target temperature (°C, rounded to one decimal).
    pub async fn set_target_temperature(&self, celsius: f64) -> Result<(), CoreError> {
        let mut state = self.inner.state.lock().await;
        let intent = DeviceUpdate {
            id: self.inner.device_id,
            temperature_set: round_to_one_decimal(celsius),
            power_on: if self.inner.include_off_option {
                state.current.power_on
            } else {
                true
            },
        };
        self.apply(&mut state, intent).await
    }

    /// Send a complete intent and, only on confirmed success, apply it
    /// to the local snapshot so an immediate read observes the intended
    /// values without waiting for the next poll. Any failure leaves the
    /// snapshot exactly as it was.
    async fn apply(
        &self,
        state: &mut ReconcilerState,
        intent: DeviceUpdate,
    ) -> Result<(), CoreError> {
        debug!(
            device_id = intent.id,
            power_on = intent.power_on,
            temperature_set = intent.temperature_set,
            "sending device update"
        );

        let applied = self.inner.client.update_device(&intent).await?;
        if !applied {
            return Err(CoreError::WriteRejected {
                device_id: intent.id,
            });
        }

        state.current.power_on = intent.power_on;
        state.current.target_temperature = intent.temperature_set;
        state.last_applied = Some(intent);
        Ok(())
    }
}

fn round_to_one_decimal(celsius: f64) -> f64 {
    (celsius * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding_clamps_to_one_decimal() {
        assert_eq!(round_to_one_decimal(21.55), 21.6);
        assert_eq!(round_to_one_decimal(21.5), 21.5);
        assert_eq!(round_to_one_decimal(18.04), 18.0);
    }
}
