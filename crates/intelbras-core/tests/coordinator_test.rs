#![allow(clippy::unwrap_used)]
// Integration tests for `EventCoordinator` against a mocked device.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use intelbras_api::{Credentials, DeviceClient};
use intelbras_core::{ACCESS_EVENT_TYPE, CoreError, DeviceConfig, EventCoordinator, PollOutcome};

const WATERMARK: i64 = 1_700_000_000;

const TWO_RECORDS: &str = "found=2\r\n\
    records[0].RecNo=1\r\n\
    records[0].CreateTime=1700000010\r\n\
    records[0].Door=0\r\n\
    records[0].Method=1\r\n\
    records[0].UserID=7\r\n\
    records[1].RecNo=2\r\n\
    records[1].CreateTime=1700000020\r\n\
    records[1].Door=0\r\n\
    records[1].Method=1\r\n\
    records[1].UserID=8\r\n";

// ── Helpers ─────────────────────────────────────────────────────────

fn config_for(server: &MockServer) -> DeviceConfig {
    let mut config = DeviceConfig::new(
        Url::parse(&server.uri()).unwrap(),
        "admin",
        SecretString::from("hunter2".to_owned()),
    );
    config.device_id = Some("front-door".into());
    config
}

fn coordinator_for(config: &DeviceConfig) -> EventCoordinator {
    let client = DeviceClient::with_client(
        reqwest::Client::new(),
        config.url.clone(),
        Credentials::new("admin", "hunter2"),
        Duration::from_secs(5),
    );
    EventCoordinator::new(Arc::new(client), config).starting_at(WATERMARK)
}

async fn mount_records(server: &MockServer, body: impl Into<Vec<u8>>) {
    Mock::given(method("GET"))
        .and(path("/cgi-bin/recordFinder.cgi"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.into()))
        .mount(server)
        .await;
}

// ── Cycles ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_first_cycle_dispatches_all_records() {
    let server = MockServer::start().await;
    mount_records(&server, TWO_RECORDS).await;
    let coordinator = coordinator_for(&config_for(&server));
    let mut rx = coordinator.subscribe();

    let outcome = coordinator.poll_once().await.unwrap();
    assert_eq!(
        outcome,
        PollOutcome::Completed {
            fetched: 2,
            dispatched: 2
        }
    );

    let first = rx.recv().await.unwrap();
    assert_eq!(first.device_id, "front-door");
    assert_eq!(first.event_type, ACCESS_EVENT_TYPE);
    assert_eq!(first.record.rec_no(), Some(1));
    let second = rx.recv().await.unwrap();
    assert_eq!(second.record.rec_no(), Some(2));

    assert_eq!(coordinator.last_events().len(), 2);
    assert!(coordinator.watermark().await > WATERMARK);
}

#[tokio::test]
async fn test_fetch_window_starts_at_watermark() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/recordFinder.cgi"))
        .and(query_param("action", "find"))
        .and(query_param("name", "AccessControlCardRec"))
        .and(query_param("StartTime", WATERMARK.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .expect(1)
        .mount(&server)
        .await;

    let coordinator = coordinator_for(&config_for(&server));
    let outcome = coordinator.poll_once().await.unwrap();
    assert_eq!(
        outcome,
        PollOutcome::Completed {
            fetched: 0,
            dispatched: 0
        }
    );
}

#[tokio::test]
async fn test_identical_cycles_dispatch_once() {
    let server = MockServer::start().await;
    mount_records(&server, TWO_RECORDS).await;
    let coordinator = coordinator_for(&config_for(&server));
    let mut rx = coordinator.subscribe();

    coordinator.poll_once().await.unwrap();
    let second = coordinator.poll_once().await.unwrap();
    assert_eq!(
        second,
        PollOutcome::Completed {
            fetched: 2,
            dispatched: 0
        }
    );

    assert!(rx.recv().await.is_ok());
    assert!(rx.recv().await.is_ok());
    assert!(rx.try_recv().is_err(), "second cycle must not republish");
}

#[tokio::test]
async fn test_only_unseen_records_are_dispatched() {
    let server = MockServer::start().await;
    let coordinator = coordinator_for(&config_for(&server));
    let mut rx = coordinator.subscribe();

    mount_records(&server, "records[0].RecNo=1\r\nrecords[0].CreateTime=1700000010\r\n").await;
    coordinator.poll_once().await.unwrap();
    let _ = rx.recv().await.unwrap();

    server.reset().await;
    mount_records(&server, TWO_RECORDS).await;
    // Same RecNo/CreateTime as before but Door/Method/UserID now present,
    // so both records have new signatures.
    let outcome = coordinator.poll_once().await.unwrap();
    assert_eq!(
        outcome,
        PollOutcome::Completed {
            fetched: 2,
            dispatched: 2
        }
    );

    server.reset().await;
    mount_records(
        &server,
        format!("{TWO_RECORDS}records[2].RecNo=3\r\nrecords[2].CreateTime=1700000030\r\n"),
    )
    .await;
    let outcome = coordinator.poll_once().await.unwrap();
    assert_eq!(
        outcome,
        PollOutcome::Completed {
            fetched: 3,
            dispatched: 1
        }
    );
}

#[tokio::test]
async fn test_record_is_redispatched_after_an_empty_cycle() {
    const ONE_RECORD: &str = "records[0].RecNo=1\r\nrecords[0].CreateTime=1700000010\r\n";

    let server = MockServer::start().await;
    let coordinator = coordinator_for(&config_for(&server));

    mount_records(&server, ONE_RECORD).await;
    let first = coordinator.poll_once().await.unwrap();
    assert_eq!(
        first,
        PollOutcome::Completed {
            fetched: 1,
            dispatched: 1
        }
    );

    server.reset().await;
    mount_records(&server, "").await;
    let empty = coordinator.poll_once().await.unwrap();
    assert_eq!(
        empty,
        PollOutcome::Completed {
            fetched: 0,
            dispatched: 0
        }
    );

    // Only the previous cycle is remembered.
    server.reset().await;
    mount_records(&server, ONE_RECORD).await;
    let third = coordinator.poll_once().await.unwrap();
    assert_eq!(
        third,
        PollOutcome::Completed {
            fetched: 1,
            dispatched: 1
        }
    );
}

// ── Failure semantics ───────────────────────────────────────────────

#[tokio::test]
async fn test_timeout_leaves_state_untouched() {
    let server = MockServer::start().await;
    let mut config = config_for(&server);
    config.fetch_timeout = Duration::from_millis(100);

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(TWO_RECORDS)
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let coordinator = coordinator_for(&config);
    let result = coordinator.poll_once().await;

    assert!(
        matches!(result, Err(CoreError::UpdateFailed { .. })),
        "expected UpdateFailed, got: {result:?}"
    );
    assert!(result.unwrap_err().is_update_failed());
    assert_eq!(coordinator.watermark().await, WATERMARK);
    assert!(coordinator.last_events().is_empty());
}

#[tokio::test]
async fn test_device_error_is_update_failed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .mount(&server)
        .await;

    let coordinator = coordinator_for(&config_for(&server));
    let err = coordinator.poll_once().await.unwrap_err();

    assert!(matches!(err, CoreError::UpdateFailed { ref message } if message.contains("503")));
    assert_eq!(coordinator.watermark().await, WATERMARK);
}

#[tokio::test]
async fn test_failed_cycle_keeps_previous_records() {
    let server = MockServer::start().await;
    mount_records(&server, TWO_RECORDS).await;
    let coordinator = coordinator_for(&config_for(&server));
    coordinator.poll_once().await.unwrap();
    let watermark = coordinator.watermark().await;

    server.reset().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    assert!(coordinator.poll_once().await.is_err());
    assert_eq!(coordinator.last_events().len(), 2);
    assert_eq!(coordinator.watermark().await, watermark);
}

#[tokio::test]
async fn test_non_text_data_counts_as_empty() {
    let server = MockServer::start().await;
    mount_records(&server, vec![0xff, 0xfe, 0x00, 0x81]).await;
    let coordinator = coordinator_for(&config_for(&server));

    let outcome = coordinator.poll_once().await.unwrap();
    assert_eq!(
        outcome,
        PollOutcome::Completed {
            fetched: 0,
            dispatched: 0
        }
    );
    assert!(coordinator.watermark().await > WATERMARK);
}

// ── Concurrency ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_overlapping_poll_is_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(TWO_RECORDS)
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let coordinator = Arc::new(coordinator_for(&config_for(&server)));
    let in_flight = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.poll_once().await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(coordinator.poll_once().await.unwrap(), PollOutcome::Skipped);

    let first = in_flight.await.unwrap().unwrap();
    assert_eq!(
        first,
        PollOutcome::Completed {
            fetched: 2,
            dispatched: 2
        }
    );
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_run_polls_until_cancelled() {
    let server = MockServer::start().await;
    mount_records(&server, TWO_RECORDS).await;
    let coordinator = Arc::new(coordinator_for(&config_for(&server)));
    let mut rx = coordinator.subscribe();

    let cancel = tokio_util::sync::CancellationToken::new();
    let task = tokio::spawn(Arc::clone(&coordinator).run(cancel.clone()));

    let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.record.rec_no(), Some(1));

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();
}
