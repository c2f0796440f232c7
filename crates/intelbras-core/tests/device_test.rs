#![allow(clippy::unwrap_used)]
// Integration tests for the `Device` context.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use intelbras_core::{CoreError, Device, DeviceConfig, DoorState};

fn config_for(server: &MockServer) -> DeviceConfig {
    DeviceConfig::new(
        Url::parse(&server.uri()).unwrap(),
        "admin",
        SecretString::from("hunter2".to_owned()),
    )
}

async fn mount_door_status(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/cgi-bin/accessControl.cgi"))
        .and(query_param("action", "getDoorStatus"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

#[test]
fn test_invalid_config_is_rejected() {
    let mut config = DeviceConfig::new(
        Url::parse("http://10.0.0.2").unwrap(),
        "admin",
        SecretString::from("x".to_owned()),
    );
    config.poll_interval_secs = 1;
    assert!(matches!(Device::new(config), Err(CoreError::Config { .. })));
}

#[tokio::test]
async fn test_door_state_is_cached() {
    let server = MockServer::start().await;
    mount_door_status(&server, "Info.status=Open\r\n").await;
    let device = Device::new(config_for(&server)).unwrap();

    assert_eq!(device.last_door_state(), None);
    let mut changes = device.door_state_changes();

    assert_eq!(device.door_state().await.unwrap(), DoorState::Open);
    assert_eq!(device.last_door_state(), Some(DoorState::Open));
    assert!(changes.has_changed().unwrap());
}

#[tokio::test]
async fn test_failed_status_keeps_cached_state() {
    let server = MockServer::start().await;
    mount_door_status(&server, "Info.status=Close\r\n").await;
    let device = Device::new(config_for(&server)).unwrap();
    device.door_state().await.unwrap();

    server.reset().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = device.door_state().await.unwrap_err();
    assert!(matches!(err, CoreError::Api { status: Some(500), .. }));
    assert_eq!(device.last_door_state(), Some(DoorState::Closed));
}

#[tokio::test]
async fn test_slow_device_reports_configured_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.timeout = Duration::from_millis(300);
    let device = Device::new(config).unwrap();

    let err = device.door_state().await.unwrap_err();
    assert!(
        matches!(err, CoreError::Timeout { timeout_secs: 1 }),
        "expected Timeout after 1s, got: {err:?}"
    );
    assert!(err.to_string().contains("1s"));
}

#[tokio::test]
async fn test_open_door_uses_configured_channel() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/accessControl.cgi"))
        .and(query_param("action", "openDoor"))
        .and(query_param("channel", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK\r\n"))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.channel = 2;
    let device = Device::new(config).unwrap();

    assert_eq!(device.open_door().await.unwrap().trim(), "OK");
}

#[tokio::test]
async fn test_start_polls_and_stop_disconnects() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/recordFinder.cgi"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("records[0].RecNo=5\r\nrecords[0].Door=0\r\n"),
        )
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.device_id = Some("lobby".into());
    let device = Device::new(config).unwrap();
    let mut events = device.subscribe_events();

    device.start().await.unwrap();
    device.start().await.unwrap();

    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.device_id, "lobby");
    assert_eq!(event.record.rec_no(), Some(5));
    assert_eq!(device.last_events().len(), 1);

    device.stop().await;
    assert!(matches!(device.start().await, Err(CoreError::Disconnected)));
    assert!(matches!(device.open_door().await, Err(CoreError::Disconnected)));
}
