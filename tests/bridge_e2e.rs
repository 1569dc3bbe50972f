//! End-to-end tests: HTTP client → bridge → fake legacy store over TCP.

use std::time::Duration;

use axum::http::StatusCode;
use legacy_bridge::bridge::BridgeOptions;
use legacy_bridge::lifecycle::FatalError;

mod common;

use common::{client, start_bridge, FakeStore, StoreEvent, PASSWORD};

#[tokio::test]
async fn outcomes_map_to_status_codes() {
    let store = FakeStore::new()
        .with_answer("alice", &["alice-pw"])
        .with_answer("shared", &["pw1", "pw2"])
        .with_answer("padded", &["", "pw1", ""]);
    let bridge = start_bridge(store, BridgeOptions::default()).await;
    let client = client();

    let res = client
        .get(bridge.url("alice"))
        .basic_auth("anyone", Some(PASSWORD))
        .send()
        .await
        .expect("bridge unreachable");
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "alice-pw");

    let res = client
        .get(bridge.url("nobody"))
        .basic_auth("anyone", Some(PASSWORD))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let res = client
        .get(bridge.url("shared"))
        .basic_auth("anyone", Some(PASSWORD))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.text().await.unwrap(), "pw1\npw2\n");

    let res = client
        .get(bridge.url("padded"))
        .basic_auth("anyone", Some(PASSWORD))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "pw1");

    bridge.shutdown.trigger();
}

#[tokio::test]
async fn unauthenticated_requests_never_query_store() {
    let store = FakeStore::new().with_answer("alice", &["alice-pw"]);
    let bridge = start_bridge(store.clone(), BridgeOptions::default()).await;
    let client = client();

    let res = client.get(bridge.url("alice")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(bridge.url("alice"))
        .basic_auth("alice", Some("guess"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(store.events().is_empty(), "store was queried without auth");

    bridge.shutdown.trigger();
}

#[tokio::test]
async fn concurrent_requests_are_strictly_serialized() {
    let names = ["u0", "u1", "u2", "u3", "u4", "u5"];
    let store = names
        .iter()
        .fold(FakeStore::new(), |store, name| {
            store.with_answer(name, &[format!("{}-pw", name).as_str()])
        })
        .with_delay(Duration::from_millis(30));
    let bridge = start_bridge(store.clone(), BridgeOptions::default()).await;
    let client = client();

    let mut tasks = Vec::new();
    for name in names {
        let client = client.clone();
        let url = bridge.url(name);
        tasks.push(tokio::spawn(async move {
            let res = client
                .get(url)
                .basic_auth("c", Some(PASSWORD))
                .send()
                .await
                .unwrap();
            (name, res.status(), res.text().await.unwrap())
        }));
    }

    for task in tasks {
        let (name, status, body) = task.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, format!("{}-pw", name));
    }

    // Every query must arrive only after the previous reply was finished.
    let events = store.events();
    assert_eq!(events.len(), names.len() * 2);
    let mut last_done = None;
    for pair in events.chunks(2) {
        match pair {
            [StoreEvent::Query(_, asked), StoreEvent::Done(done)] => {
                if let Some(previous) = last_done {
                    assert!(*asked >= previous, "query written before previous drain completed");
                }
                last_done = Some(*done);
            }
            other => panic!("interleaved store events: {:?}", other),
        }
    }

    bridge.shutdown.trigger();
}

#[tokio::test]
async fn store_hangup_is_fatal_and_stops_service() {
    let store = FakeStore::new().with_answer("alice", &["alice-pw"]).close_after(1);
    let mut bridge = start_bridge(store, BridgeOptions::default()).await;
    let client = client();

    let res = client
        .get(bridge.url("alice"))
        .basic_auth("c", Some(PASSWORD))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let supervisor = bridge.supervisor.take().unwrap();
    let fatal = tokio::time::timeout(Duration::from_secs(5), supervisor.wait())
        .await
        .expect("hangup was not reported")
        .expect("supervisor closed without a failure");
    assert!(matches!(*fatal, FatalError::ControlClosed));
    assert_eq!(fatal.exit_code(), 1);

    let res = client
        .get(bridge.url("alice"))
        .basic_auth("c", Some(PASSWORD))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

    bridge.store_task.await.unwrap();
    bridge.shutdown.trigger();
}

#[tokio::test]
async fn drain_timeout_returns_gateway_timeout_and_recovers() {
    // "slow" gets an answer only after the bridge has given up on it.
    let store = FakeStore::new()
        .with_answer("slow", &["slow-pw"])
        .with_answer("fast", &["fast-pw"])
        .with_delay_for("slow", Duration::from_millis(150));
    let options = BridgeOptions {
        drain_timeout: Some(Duration::from_millis(100)),
        ..BridgeOptions::default()
    };
    let bridge = start_bridge(store, options).await;
    let client = client();

    let res = client
        .get(bridge.url("slow"))
        .basic_auth("c", Some(PASSWORD))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::GATEWAY_TIMEOUT);

    // Let the late reply land, then make sure it is not handed to "fast".
    tokio::time::sleep(Duration::from_millis(100)).await;
    let res = client
        .get(bridge.url("fast"))
        .basic_auth("c", Some(PASSWORD))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "fast-pw");

    bridge.shutdown.trigger();
}
