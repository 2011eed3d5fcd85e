#![allow(clippy::unwrap_used)]
// End-to-end tests for `DeviceReconciler` and `Controller` using wiremock.

use std::time::Duration;

use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ebeco_api::{AccountConfig, DeviceClient, Transport};
use ebeco_core::{
    Controller, CoreError, DeviceReconciler, PlatformConfig, Program, ProgramState,
    ThermostatState,
};

// ── Helpers ─────────────────────────────────────────────────────────

const LIST_PATH: &str = "/api/services/app/Devices/GetUserDevices";
const UPDATE_PATH: &str = "/api/services/app/Devices/UpdateUserDevice";
const LOGIN_PATH: &str = "/api/TokenAuth/Authenticate";

fn envelope(result: serde_json::Value) -> serde_json::Value {
    json!({
        "result": result,
        "success": true,
        "error": null,
        "unAuthorizedRequest": false
    })
}

fn write_response(success: bool) -> serde_json::Value {
    json!({
        "result": null,
        "success": success,
        "error": null,
        "unAuthorizedRequest": false
    })
}

fn device_json(id: i64, power_on: bool, temperature_set: f64) -> serde_json::Value {
    json!({
        "id": id,
        "displayName": format!("Thermostat {id}"),
        "powerOn": power_on,
        "selectedProgram": "Manual",
        "programState": "Active",
        "temperatureSet": temperature_set,
        "temperatureFloor": 21.0,
        "temperatureRoom": 22.0,
        "hasError": false,
        "errorMessage": null
    })
}

fn initial_state(id: i64, power_on: bool, target: f64) -> ThermostatState {
    ThermostatState {
        id,
        display_name: format!("Thermostat {id}"),
        power_on,
        selected_program: Program::Manual,
        program_state: ProgramState::Active,
        target_temperature: target,
        floor_temperature: 21.0,
        room_temperature: 22.0,
        has_error: false,
        error_message: None,
    }
}

async fn setup_client() -> (MockServer, DeviceClient) {
    let server = MockServer::start().await;
    let mut config = AccountConfig::new(
        "hello@example.com",
        SecretString::from("world".to_owned()),
    );
    config.api_host = Some(Url::parse(&server.uri()).unwrap());
    let transport = Transport::new(config).unwrap();
    (server, DeviceClient::new(transport))
}

fn platform_config(server: &MockServer) -> PlatformConfig {
    let mut config = PlatformConfig::new(
        "hello@example.com",
        SecretString::from("world".to_owned()),
    );
    config.api_host = Some(Url::parse(&server.uri()).unwrap());
    config
}

// ── Write tests ─────────────────────────────────────────────────────

#[tokio::test]
async fn set_target_temperature_sends_complete_intent_and_applies_optimistically() {
    let (server, client) = setup_client().await;

    // The unchanged field (powerOn) is carried from the snapshot.
    Mock::given(method("PUT"))
        .and(path(UPDATE_PATH))
        .and(body_json(json!({
            "id": 1,
            "temperatureSet": 21.5,
            "powerOn": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(write_response(true)))
        .expect(1)
        .mount(&server)
        .await;

    let reconciler = DeviceReconciler::new(initial_state(1, true, 20.0), client, true);
    reconciler.set_target_temperature(21.5).await.unwrap();

    // Visible immediately, before any poll tick.
    let current = reconciler.current().await;
    assert_eq!(current.target_temperature, 21.5);
    assert!(current.power_on);
    assert_eq!(reconciler.last_applied().await.unwrap().temperature_set, 21.5);
}

#[tokio::test]
async fn set_power_off_applies_optimistically() {
    let (server, client) = setup_client().await;

    Mock::given(method("PUT"))
        .and(path(UPDATE_PATH))
        .and(body_json(json!({
            "id": 1,
            "temperatureSet": 20.0,
            "powerOn": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(write_response(true)))
        .expect(1)
        .mount(&server)
        .await;

    let reconciler = DeviceReconciler::new(initial_state(1, true, 20.0), client, true);
    reconciler.set_power(false).await.unwrap();

    assert!(!reconciler.current().await.power_on);
}

#[tokio::test]
async fn rejected_write_leaves_state_unchanged() {
    let (server, client) = setup_client().await;

    // HTTP 200 but the remote reports the write was not applied.
    Mock::given(method("PUT"))
        .and(path(UPDATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(write_response(false)))
        .mount(&server)
        .await;

    let reconciler = DeviceReconciler::new(initial_state(1, true, 20.0), client, true);
    let result = reconciler.set_power(false).await;

    assert!(
        matches!(result, Err(CoreError::WriteRejected { device_id: 1 })),
        "expected WriteRejected, got: {result:?}"
    );
    let current = reconciler.current().await;
    assert!(current.power_on);
    assert_eq!(current.target_temperature, 20.0);
    assert!(reconciler.last_applied().await.is_none());
}

#[tokio::test]
async fn transport_failure_leaves_state_unchanged() {
    let (server, client) = setup_client().await;

    Mock::given(method("PUT"))
        .and(path(UPDATE_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let reconciler = DeviceReconciler::new(initial_state(1, true, 20.0), client, true);
    let result = reconciler.set_target_temperature(25.0).await;

    assert!(result.is_err());
    assert_eq!(reconciler.current().await.target_temperature, 20.0);
}

#[tokio::test]
async fn disabled_off_option_ignores_power_off_and_forces_power_on_in_intents() {
    let (server, client) = setup_client().await;

    // Power-off must not reach the wire at all.
    Mock::given(method("PUT"))
        .and(path(UPDATE_PATH))
        .and(body_json(json!({
            "id": 1,
            "temperatureSet": 19.0,
            "powerOn": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(write_response(true)))
        .expect(1)
        .mount(&server)
        .await;

    // Snapshot says the device is off; with the off option disabled the
    // temperature intent still carries powerOn = true.
    let reconciler = DeviceReconciler::new(initial_state(1, false, 20.0), client, false);

    reconciler.set_power(false).await.unwrap();
    reconciler.set_target_temperature(19.0).await.unwrap();
}

// ── Refresh tests ───────────────────────────────────────────────────

#[tokio::test]
async fn refresh_reports_delta_then_nothing_when_unchanged() {
    let (server, client) = setup_client().await;

    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(envelope(json!([device_json(1, false, 18.0)]))),
        )
        .expect(2)
        .mount(&server)
        .await;

    let reconciler = DeviceReconciler::new(initial_state(1, true, 20.0), client, true);

    let first = reconciler.refresh().await.unwrap();
    assert_eq!(first.power_on, Some(false));
    assert_eq!(first.target_temperature, Some(18.0));

    // Round-trip: no remote-side change -- zero deltas.
    let second = reconciler.refresh().await.unwrap();
    assert!(second.is_empty());
}

#[tokio::test]
async fn refresh_fails_with_device_not_found_when_remote_list_drops_the_id() {
    let (server, client) = setup_client().await;

    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(envelope(json!([device_json(99, true, 20.0)]))),
        )
        .mount(&server)
        .await;

    let reconciler = DeviceReconciler::new(initial_state(1, true, 20.0), client, true);
    let result = reconciler.refresh().await;

    assert!(
        matches!(result, Err(CoreError::DeviceNotFound { device_id: 1 })),
        "expected DeviceNotFound, got: {result:?}"
    );
    // Snapshot untouched; the reconciler keeps operating.
    assert_eq!(reconciler.current().await.target_temperature, 20.0);
}

#[tokio::test]
async fn tick_during_inflight_refresh_is_skipped() {
    let (server, client) = setup_client().await;

    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(envelope(json!([device_json(1, true, 20.0)])))
                .set_delay(Duration::from_millis(500)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let reconciler = DeviceReconciler::new(initial_state(1, true, 20.0), client, true);

    let slow = {
        let reconciler = reconciler.clone();
        tokio::spawn(async move { reconciler.refresh().await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    // One refresh in flight: the tick is skipped, no second network call.
    assert!(reconciler.refresh_if_idle().await.is_none());

    slow.await.unwrap().unwrap();
}

// ── Controller tests ────────────────────────────────────────────────

#[test]
fn missing_credentials_fail_at_construction() {
    let config = PlatformConfig::new("", SecretString::from("world".to_owned()));
    let result = Controller::new(config);
    assert!(
        matches!(result, Err(CoreError::Config { .. })),
        "expected Config error, got an unexpected result"
    );

    let config = PlatformConfig::new("hello@example.com", SecretString::from(String::new()));
    assert!(matches!(
        Controller::new(config),
        Err(CoreError::Config { .. })
    ));
}

#[tokio::test]
async fn connect_surfaces_two_factor_accounts() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(LOGIN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
            "accessToken": "unusable-token",
            "expireInSeconds": 86400,
            "requiresTwoFactorVerification": true
        }))))
        .mount(&server)
        .await;

    let controller = Controller::new(platform_config(&server)).unwrap();
    let result = controller.connect().await;

    assert!(
        matches!(result, Err(CoreError::TwoFactorRequired)),
        "expected TwoFactorRequired, got: {result:?}"
    );
}

#[tokio::test]
async fn connect_discovers_devices_and_polling_publishes_deltas() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(LOGIN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
            "accessToken": "token-1",
            "expireInSeconds": 86400,
            "requiresTwoFactorVerification": false
        }))))
        .mount(&server)
        .await;

    // Discovery sees 20.0 °C; every later poll sees 21.5 °C.
    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(envelope(json!([device_json(1, true, 20.0)]))),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(envelope(json!([device_json(1, true, 21.5)]))),
        )
        .mount(&server)
        .await;

    let mut config = platform_config(&server);
    config.poll_interval = Duration::from_millis(100);
    let controller = Controller::new(config).unwrap();

    let mut updates = controller.updates();
    let discovered = controller.connect().await.unwrap();
    assert_eq!(discovered.len(), 1);
    assert_eq!(discovered[0].id, 1);
    assert_eq!(discovered[0].target_temperature, 20.0);

    let event = tokio::time::timeout(Duration::from_secs(5), updates.recv())
        .await
        .expect("timed out waiting for a state event")
        .unwrap();

    assert_eq!(event.device_id, 1);
    assert_eq!(event.delta.target_temperature, Some(21.5));

    // The local snapshot followed the refresh.
    let device = controller.reconciler(1).await.unwrap().current().await;
    assert_eq!(device.target_temperature, 21.5);

    controller.shutdown().await;
}

#[tokio::test]
async fn controller_routes_writes_to_the_owning_reconciler() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(LOGIN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
            "accessToken": "token-1",
            "expireInSeconds": 86400,
            "requiresTwoFactorVerification": false
        }))))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(envelope(json!([device_json(1, true, 20.0)]))),
        )
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(UPDATE_PATH))
        .and(body_json(json!({
            "id": 1,
            "temperatureSet": 21.5,
            "powerOn": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(write_response(true)))
        .expect(1)
        .mount(&server)
        .await;

    // Long poll interval: no tick interferes with the write under test.
    let mut config = platform_config(&server);
    config.poll_interval = Duration::from_secs(3600);
    let controller = Controller::new(config).unwrap();
    controller.connect().await.unwrap();

    controller.set_target_temperature(1, 21.5).await.unwrap();
    let devices = controller.devices().await;
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].target_temperature, 21.5);

    // Default sensor selection reports the room reading.
    assert_eq!(controller.current_temperature(1).await, Some(22.0));

    let unknown = controller.set_power(42, true).await;
    assert!(matches!(
        unknown,
        Err(CoreError::DeviceNotFound { device_id: 42 })
    ));

    controller.shutdown().await;
}
