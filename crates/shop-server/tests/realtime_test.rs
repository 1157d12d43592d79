//! Realtime fan-out integration tests.
//!
//! Tests the full path:
//! - WebSocket clients registering with the hub
//! - Event ingress broadcasting to every client
//! - Session cleanup on disconnect, idle timeout and shutdown
//! - Rate limiting on the ingress route

mod integration;
use integration::common::test_server::{closed_within, new_order_event, next_text, TestServer};

use shop_ratelimit::RoutePolicy;
use shop_server::AppConfig;
use std::collections::BTreeMap;
use std::time::Duration;

const RECV_WAIT: Duration = Duration::from_secs(2);
const QUIET_WAIT: Duration = Duration::from_millis(300);

/// An admin and a regular user each receive a new order exactly once.
#[tokio::test]
async fn test_new_order_reaches_admin_and_user_once() {
    let server = TestServer::start().await;

    let mut admin = server.connect("/ws/orders", 1, "admin").await;
    let mut user = server.connect("/ws/announcements", 2, "user").await;
    server.wait_for_sessions(2).await;

    let response = server.publish(&new_order_event(42), 1, "admin").await;
    assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);

    for client in [&mut admin, &mut user] {
        let msg = next_text(client, RECV_WAIT).await.expect("event not delivered");
        assert_eq!(msg["type"], "new_order");
        assert_eq!(msg["order"]["id"], 42);
        assert!(next_text(client, QUIET_WAIT).await.is_none());
    }

    server.shutdown().await.unwrap();
}

/// Clients connecting after a broadcast do not receive it.
#[tokio::test]
async fn test_late_client_misses_earlier_event() {
    let server = TestServer::start().await;

    let mut early = server.connect("/ws/orders", 1, "admin").await;
    server.wait_for_sessions(1).await;
    server.publish(&new_order_event(1), 1, "admin").await;
    assert_eq!(next_text(&mut early, RECV_WAIT).await.unwrap()["order"]["id"], 1);

    let mut late = server.connect("/ws/orders", 0, "").await;
    server.wait_for_sessions(2).await;
    assert!(next_text(&mut late, QUIET_WAIT).await.is_none());

    server.publish(&new_order_event(2), 1, "admin").await;
    assert_eq!(next_text(&mut late, RECV_WAIT).await.unwrap()["order"]["id"], 2);
    assert_eq!(next_text(&mut early, RECV_WAIT).await.unwrap()["order"]["id"], 2);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_non_admin_publish_is_forbidden() {
    let server = TestServer::start().await;
    let mut client = server.connect("/ws/orders", 3, "user").await;
    server.wait_for_sessions(1).await;

    let response = server.publish(&new_order_event(5), 3, "user").await;
    assert_eq!(response.status(), reqwest::StatusCode::FORBIDDEN);
    assert!(next_text(&mut client, QUIET_WAIT).await.is_none());

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_client_close_unregisters_session() {
    let server = TestServer::start().await;

    let mut client = server.connect("/ws/orders", 4, "user").await;
    let _other = server.connect("/ws/orders", 5, "user").await;
    server.wait_for_sessions(2).await;

    client.close(None).await.unwrap();
    server.wait_for_sessions(1).await;

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_silent_client_is_dropped_after_idle_timeout() {
    let mut config = AppConfig::default();
    config.hub.heartbeat.interval_secs = 1;
    config.hub.heartbeat.timeout_secs = 2;
    let server = TestServer::start_with(config).await;

    // Never polled, so pings go unanswered.
    let _silent = server.connect("/ws/orders", 6, "user").await;
    server.wait_for_sessions(1).await;
    server.wait_for_sessions(0).await;

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_closes_connected_clients() {
    let server = TestServer::start().await;

    let mut a = server.connect("/ws/orders", 7, "user").await;
    let mut b = server.connect("/ws/announcements", 0, "").await;
    server.wait_for_sessions(2).await;

    server.shutdown().await.unwrap();

    assert!(closed_within(&mut a, RECV_WAIT).await);
    assert!(closed_within(&mut b, RECV_WAIT).await);
}

#[tokio::test]
async fn test_event_ingress_is_rate_limited() {
    let mut config = AppConfig::default();
    config.rate_limit.routes = BTreeMap::from([(
        "/api/events".to_string(),
        RoutePolicy::new(0.01, 2),
    )]);
    let server = TestServer::start_with(config).await;

    for id in 0..2 {
        let response = server.publish(&new_order_event(id), 1, "admin").await;
        assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);
    }

    let response = server.publish(&new_order_event(3), 1, "admin").await;
    assert_eq!(response.status(), reqwest::StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.text().await.unwrap(), "429 - Too Many Requests");

    assert_eq!(server.health().await["rate_limit_entries"], 1);

    server.shutdown().await.unwrap();
}
