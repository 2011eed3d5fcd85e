// ── Controller abstraction ──
//
// Account lifecycle management: authentication, device discovery,
// per-device polling tasks, and write routing. This is the boundary the
// host collaborator programs against; everything it needs flows through
// the methods and the broadcast channel here.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock, broadcast};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use ebeco_api::{DeviceClient, Transport};

use crate::config::PlatformConfig;
use crate::error::CoreError;
use crate::model::{StateDelta, ThermostatState};
use crate::reconciler::DeviceReconciler;

const EVENT_CHANNEL_SIZE: usize = 64;

/// State change published after a successful refresh.
#[derive(Debug, Clone)]
pub struct StateEvent {
    pub device_id: i64,
    pub delta: StateDelta,
}

/// The main entry point for the host collaborator.
///
/// Cheaply cloneable via `Arc`. One controller per account: it owns the
/// single transport/credential store that every per-device reconciler
/// shares.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: PlatformConfig,
    client: DeviceClient,
    reconcilers: RwLock<HashMap<i64, DeviceReconciler>>,
    events: broadcast::Sender<StateEvent>,
    cancel: CancellationToken,
    /// Child token for the current connection. Cancelled on shutdown
    /// and replaced on the next connect, so the root token survives.
    cancel_child: Mutex<CancellationToken>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Controller {
    /// Create a controller from configuration. Validates the credentials
    /// (missing username/password is a fatal [`CoreError::Config`]) but
    /// does NOT connect -- call [`connect()`](Self::connect) to
    /// authenticate and start polling.
    pub fn new(config: PlatformConfig) -> Result<Self, CoreError> {
        let transport = Transport::new(config.account())?;
        let client = DeviceClient::new(transport);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let cancel = CancellationToken::new();
        let cancel_child = cancel.child_token();

        Ok(Self {
            inner: Arc::new(ControllerInner {
                config,
                client,
                reconcilers: RwLock::new(HashMap::new()),
                events,
                cancel,
                cancel_child: Mutex::new(cancel_child),
                task_handles: Mutex::new(Vec::new()),
            }),
        })
    }

    /// Access the platform configuration.
    pub fn config(&self) -> &PlatformConfig {
        &self.inner.config
    }

    // ── Connection lifecycle ─────────────────────────────────────────

    /// Authenticate, discover the account's thermostats, and start one
    /// polling task per device.
    ///
    /// Returns the discovered devices in remote order. A two-factor
    /// account fails with [`CoreError::TwoFactorRequired`] and must be
    /// surfaced to the user.
    pub async fn connect(&self) -> Result<Vec<ThermostatState>, CoreError> {
        let outcome = self.inner.client.transport().login().await?;
        info!(
            expires_in_secs = outcome.expires_in.as_secs(),
            "logged in to Ebeco Connect"
        );

        let devices = self.inner.client.list_devices().await?;
        info!(count = devices.len(), "discovered devices");

        let child = self.inner.cancel.child_token();
        *self.inner.cancel_child.lock().await = child.clone();

        let mut discovered = Vec::with_capacity(devices.len());
        let mut reconcilers = self.inner.reconcilers.write().await;
        let mut handles = self.inner.task_handles.lock().await;

        for device in devices {
            let state = ThermostatState::from(device);
            info!(
                device_id = state.id,
                name = %state.display_name,
                "tracking thermostat"
            );

            let reconciler = DeviceReconciler::new(
                state.clone(),
                self.inner.client.clone(),
                self.inner.config.include_off_option,
            );
            // Exactly one reconciler per device id; a duplicate id in
            // the discovery list replaces the earlier entry.
            reconcilers.insert(state.id, reconciler.clone());

            handles.push(tokio::spawn(poll_task(
                reconciler,
                self.inner.events.clone(),
                self.inner.config.poll_interval,
                child.clone(),
            )));

            discovered.push(state);
        }

        Ok(discovered)
    }

    /// Stop all polling tasks and wait for them to exit. The controller
    /// can be reconnected afterwards.
    pub async fn shutdown(&self) {
        self.inner.cancel_child.lock().await.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        self.inner.reconcilers.write().await.clear();
    }

    // ── Collaborator outputs ─────────────────────────────────────────

    /// Subscribe to per-device state deltas. An event is published after
    /// each successful refresh that observed at least one changed field.
    pub fn updates(&self) -> broadcast::Receiver<StateEvent> {
        self.inner.events.subscribe()
    }

    /// Current snapshots of all tracked devices.
    pub async fn devices(&self) -> Vec<ThermostatState> {
        let reconcilers = self.inner.reconcilers.read().await;
        let mut out = Vec::with_capacity(reconcilers.len());
        for reconciler in reconcilers.values() {
            out.push(reconciler.current().await);
        }
        out
    }

    /// The reconciler tracking `device_id`, if discovered.
    pub async fn reconciler(&self, device_id: i64) -> Option<DeviceReconciler> {
        self.inner.reconcilers.read().await.get(&device_id).cloned()
    }

    /// One device's current temperature as reported by the configured
    /// sensor (floor or room).
    pub async fn current_temperature(&self, device_id: i64) -> Option<f64> {
        let reconciler = self.reconciler(device_id).await?;
        let state = reconciler.current().await;
        Some(state.current_temperature(self.inner.config.temperature_sensor))
    }

    // ── Collaborator inputs ──────────────────────────────────────────

    /// Turn one thermostat on or off.
    pub async fn set_power(&self, device_id: i64, on: bool) -> Result<(), CoreError> {
        let reconciler = self
            .reconciler(device_id)
            .await
            .ok_or(CoreError::DeviceNotFound { device_id })?;
        reconciler.set_power(on).await
    }

    /// Set one thermostat's target temperature (°C).
    pub async fn set_target_temperature(
        &self,
        device_id: i64,
        celsius: f64,
    ) -> Result<(), CoreError> {
        let reconciler = self
            .reconciler(device_id)
            .await
            .ok_or(CoreError::DeviceNotFound { device_id })?;
        reconciler.set_target_temperature(celsius).await
    }
}

// ── Background tasks ─────────────────────────────────────────────────

/// Periodically refresh one device and publish non-empty deltas.
///
/// A tick that lands while the device's lock is held is skipped, and
/// missed ticks are not replayed -- a slow remote degrades to a lower
/// effective poll rate instead of a queue of stale refreshes.
async fn poll_task(
    reconciler: DeviceReconciler,
    events: broadcast::Sender<StateEvent>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval.tick().await; // discard the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                match reconciler.refresh_if_idle().await {
                    None => {}
                    Some(Ok(delta)) => {
                        if !delta.is_empty() {
                            let _ = events.send(StateEvent {
                                device_id: reconciler.device_id(),
                                delta,
                            });
                        }
                    }
                    Some(Err(e)) => {
                        warn!(
                            device_id = reconciler.device_id(),
                            error = %e,
                            "periodic refresh failed"
                        );
                    }
                }
            }
        }
    }
}
