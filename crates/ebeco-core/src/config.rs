// ── Runtime platform configuration ──
//
// These types describe how to reach one Ebeco Connect account and how
// the polling layer should behave. The host collaborator constructs a
// `PlatformConfig` and hands it in; this crate never reads config files.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use ebeco_api::AccountConfig;

use crate::model::TemperatureSensor;

/// Default device polling period.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10_000);

/// Configuration for one account, supplied by the host collaborator.
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    /// Account username (email address). Required.
    pub username: String,
    /// Account password. Required.
    pub password: SecretString,
    /// API host override (for development). `None` selects the
    /// production cloud endpoint.
    pub api_host: Option<Url>,
    /// How often each device's state is refreshed.
    pub poll_interval: Duration,
    /// Whether "off" is a controllable target. When disabled, power
    /// writes always send `powerOn = true` and a power-off request is
    /// ignored.
    pub include_off_option: bool,
    /// Which sensor supplies the "current temperature" reading.
    pub temperature_sensor: TemperatureSensor,
    /// Request timeout for remote calls.
    pub timeout: Duration,
}

impl PlatformConfig {
    /// Create a config with the documented defaults: production host,
    /// 10 s polling, off option enabled, room sensor.
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
            api_host: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            include_off_option: true,
            temperature_sensor: TemperatureSensor::default(),
            timeout: Duration::from_secs(30),
        }
    }

    /// The wire-level account configuration for the transport.
    pub(crate) fn account(&self) -> AccountConfig {
        AccountConfig {
            username: self.username.clone(),
            password: self.password.clone(),
            api_host: self.api_host.clone(),
            timeout: self.timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = PlatformConfig::new("user@example.com", SecretString::from("pw".to_owned()));
        assert_eq!(config.poll_interval, Duration::from_millis(10_000));
        assert!(config.include_off_option);
        assert!(config.api_host.is_none());
        assert_eq!(config.temperature_sensor, TemperatureSensor::Room);
    }
}
