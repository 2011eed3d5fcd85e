// ebeco-api: Async Rust client for the Ebeco Connect thermostat cloud API

pub mod auth;
pub mod devices;
pub mod error;
pub mod models;
pub mod transport;

pub use auth::{BearerToken, LoginOutcome};
pub use devices::DeviceClient;
pub use error::Error;
pub use models::{ApiEnvelope, Device, DeviceUpdate};
pub use transport::{AccountConfig, DEFAULT_API_HOST, Transport};
