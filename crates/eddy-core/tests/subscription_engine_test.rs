// End-to-end subscription engine tests over a mock gateway.
//
// The state-machine unit tests live next to the engine; these drive the
// full path: session -> engine -> streaming HTTP -> cache.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use eddy_api::{ClientConfig, GatewayClient};
use eddy_core::{CreateQueryOptions, CreateSubscriptionOptions, Session, SubscriptionStatus};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, Session) {
    let server = MockServer::start().await;
    let config = ClientConfig::new(server.uri().parse().unwrap()).with_csrf(false);
    let client = Arc::new(GatewayClient::new(config).unwrap());
    (server, Session::new(client))
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

fn ndjson(frames: &[serde_json::Value]) -> String {
    frames
        .iter()
        .map(|f| format!("{f}\n"))
        .collect::<String>()
}

// ── Subscription lifecycle ──────────────────────────────────────────

#[tokio::test]
async fn subscription_delivers_through_cache_with_gated_hooks() {
    let (server, session) = setup().await;

    // Ada, then a delivered error, then Ada2 -- the spec's example run
    let body = ndjson(&[
        json!({"data": {"id": "42", "name": "Ada"}}),
        json!({"error": {"message": "disconnected"}}),
        json!({"data": {"id": "42", "name": "Ada2"}}),
    ]);

    Mock::given(method("GET"))
        .and(path("/operations/users/subscribe"))
        .and(query_param("eddy_variables", r#"{"id":"42"}"#))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
        .mount(&server)
        .await;

    let successes = Arc::new(AtomicUsize::new(0));
    let errors = Arc::new(AtomicUsize::new(0));
    let s = Arc::clone(&successes);
    let e = Arc::clone(&errors);

    let binding = session.create_subscription(
        CreateSubscriptionOptions::new("users/subscribe")
            .input(json!({"id": "42"}))
            .on_success(move |_| {
                s.fetch_add(1, Ordering::SeqCst);
            })
            .on_error(move |_| {
                e.fetch_add(1, Ordering::SeqCst);
            }),
    );

    wait_until(|| binding.data().is_some_and(|d| d["name"] == "Ada2")).await;

    // The error delivery reset the first-success gate, so the third
    // frame fired the success hook again: loading -> subscribed ->
    // idle -> subscribed.
    assert_eq!(successes.load(Ordering::SeqCst), 2);
    assert_eq!(errors.load(Ordering::SeqCst), 1);
    assert_eq!(binding.status(), SubscriptionStatus::Subscribed);

    // Cache entry for the same key holds the latest payload
    let state = session.cache().state(binding.key());
    assert_eq!(state.data().unwrap()["name"], "Ada2");
}

#[tokio::test]
async fn establishment_failure_routes_to_error_hook() {
    let (server, session) = setup().await;

    Mock::given(method("GET"))
        .and(path("/operations/users/subscribe"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let errors = Arc::new(AtomicUsize::new(0));
    let e = Arc::clone(&errors);

    let binding = session.create_subscription(
        CreateSubscriptionOptions::new("users/subscribe").on_error(move |err| {
            assert!(err.to_string().contains("500"));
            e.fetch_add(1, Ordering::SeqCst);
        }),
    );

    wait_until(|| errors.load(Ordering::SeqCst) == 1).await;
    assert_eq!(binding.status(), SubscriptionStatus::Idle);
    assert!(!binding.is_subscribed());
}

#[tokio::test]
async fn disabled_subscription_never_connects() {
    let (server, session) = setup().await;

    // No mock mounted: any request would 404 and the mock server
    // records it; expect zero requests total.
    let binding = session
        .create_subscription(CreateSubscriptionOptions::new("users/subscribe").disabled());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(binding.status(), SubscriptionStatus::Idle);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn stop_is_idempotent_and_drop_stops() {
    let (server, session) = setup().await;

    Mock::given(method("GET"))
        .and(path("/operations/users/subscribe"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("{\"data\":{\"n\":1}}\n", "application/x-ndjson")
                .set_delay(Duration::from_millis(20)),
        )
        .mount(&server)
        .await;

    let binding =
        session.create_subscription(CreateSubscriptionOptions::new("users/subscribe"));

    binding.stop();
    binding.stop();
    assert_eq!(binding.status(), SubscriptionStatus::Idle);

    // Dropping after an explicit stop must not panic or double-cancel
    drop(binding);
}

#[tokio::test]
async fn subscribe_once_passes_flag_to_gateway() {
    let (server, session) = setup().await;

    Mock::given(method("GET"))
        .and(path("/operations/users/subscribe"))
        .and(query_param("eddy_subscribe_once", "true"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("{\"data\":{\"n\":1}}\n", "application/x-ndjson"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let binding = session.create_subscription(
        CreateSubscriptionOptions::new("users/subscribe").subscribe_once(),
    );

    wait_until(|| binding.data().is_some()).await;
    assert!(binding.is_subscribed());
}

#[tokio::test]
async fn reset_on_mount_clears_stale_entry_before_subscribing() {
    let (server, session) = setup().await;

    Mock::given(method("GET"))
        .and(path("/operations/users/subscribe"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("{\"data\":{\"n\":\"fresh\"}}\n", "application/x-ndjson")
                .set_delay(Duration::from_millis(100)),
        )
        .mount(&server)
        .await;

    // Seed a stale value under the subscription's key
    let key = session.query_key("users/subscribe", None);
    session.cache().set_query_data(&key, json!({"n": "stale"}));

    let binding =
        session.create_subscription(CreateSubscriptionOptions::new("users/subscribe").reset_on_mount());

    // The stale payload is gone before the stream delivers
    assert!(binding.data().is_none());

    wait_until(|| binding.data().is_some_and(|d| d["n"] == "fresh")).await;
}

// ── Live queries ────────────────────────────────────────────────────

#[tokio::test]
async fn live_query_streams_and_never_polls() {
    let (server, session) = setup().await;

    Mock::given(method("GET"))
        .and(path("/operations/users/get"))
        .and(query_param("eddy_live", "true"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(
                ndjson(&[
                    json!({"data": {"id": "42", "name": "Ada"}}),
                    json!({"data": {"id": "42", "name": "Ada2"}}),
                ]),
                "application/x-ndjson",
            ),
        )
        .mount(&server)
        .await;

    let binding = session.create_query(
        CreateQueryOptions::new("users/get")
            .input(json!({"id": "42"}))
            .live(),
    );

    wait_until(|| binding.data().is_some_and(|d| d["name"] == "Ada2")).await;
    assert!(binding.is_subscribed());
    assert_eq!(
        binding.subscription_status(),
        Some(SubscriptionStatus::Subscribed)
    );

    // Only the streaming path touched the network: every recorded
    // request carries the live flag.
    let requests = server.received_requests().await.unwrap();
    assert!(!requests.is_empty());
    for request in &requests {
        assert!(
            request.url.query().unwrap_or("").contains("eddy_live=true"),
            "unexpected request/response call: {}",
            request.url
        );
    }
}

#[tokio::test]
async fn dropping_live_binding_stops_engine() {
    let (server, session) = setup().await;

    Mock::given(method("GET"))
        .and(path("/operations/users/get"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("{\"data\":{\"n\":1}}\n", "application/x-ndjson"),
        )
        .mount(&server)
        .await;

    let binding = session.create_query(CreateQueryOptions::new("users/get").live());
    wait_until(|| binding.is_subscribed()).await;

    drop(binding);
    // A fresh binding for the same key starts its own engine cleanly
    let again = session.create_query(CreateQueryOptions::new("users/get").live());
    wait_until(|| again.is_subscribed()).await;
}
