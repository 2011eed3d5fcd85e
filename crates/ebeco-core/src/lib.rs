//! Device state reconciliation layer between `ebeco-api` and a
//! home-automation host.
//!
//! This crate owns the stateful side of the client:
//!
//! - **[`Controller`]** — Facade managing the account lifecycle:
//!   [`connect()`](Controller::connect) authenticates, discovers the
//!   account's thermostats, then spawns one polling task per device.
//!   State changes are published as [`StateEvent`] deltas on a broadcast
//!   channel; writes are routed to the owning reconciler.
//!
//! - **[`DeviceReconciler`]** — Per-device snapshot owner. Serializes
//!   refreshes and writes behind one lock, skips poll ticks while busy,
//!   and applies confirmed writes to the local snapshot optimistically.
//!
//! - **Domain model** ([`model`]) — [`ThermostatState`] snapshots with
//!   typed [`Program`]/[`ProgramState`] values and [`StateDelta`]
//!   changed-field diffs.

pub mod config;
pub mod controller;
pub mod error;
pub mod model;
pub mod reconciler;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{DEFAULT_POLL_INTERVAL, PlatformConfig};
pub use controller::{Controller, StateEvent};
pub use error::CoreError;
pub use model::{Program, ProgramState, StateDelta, TemperatureSensor, ThermostatState};
pub use reconciler::DeviceReconciler;
