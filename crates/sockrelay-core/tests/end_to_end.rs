//! Refresh and dispatch over real Unix sockets on disk.

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use sockrelay_core::{Client, DispatchError};
use sockrelay_test_utils::config::TestConfigBuilder;
use sockrelay_test_utils::{SocketTree, instance};

#[test_log::test(tokio::test)]
async fn test_refresh_then_dispatch() {
    let mut tree = SocketTree::new();
    let one = tree.add_instance("1", instance::success_or_error());
    let two = tree.add_instance("2", instance::success_or_error());

    let client = Client::new(tree.root(), tree.socket_name());
    assert_eq!(client.refresh().await.unwrap(), 2);

    let mut known = client.sockets();
    known.sort();
    let mut expected = vec![one, two];
    expected.sort();
    assert_eq!(known, expected);

    let resp = client
        .execute_authorized_request("http://example.com/success", &json!({ "key": "value" }))
        .await
        .unwrap();
    assert_eq!(resp, b"success_response");

    let err = client
        .execute_authorized_request("http://example.com/error", &json!({ "key": "value" }))
        .await
        .unwrap_err();
    let text = err.to_string();
    assert!(text.contains("failed with status 500"));
    assert!(text.contains("error_response"));
}

#[test_log::test(tokio::test)]
async fn test_dead_socket_is_skipped() {
    let mut tree = SocketTree::new();
    tree.add_dead_socket("a");
    tree.add_instance("b", instance::ok("live"));

    let client = Client::new(tree.root(), tree.socket_name());
    client.refresh().await.unwrap();
    assert_eq!(client.sockets().len(), 2);

    for _ in 0..2 {
        let resp = client
            .execute_authorized_request("http://x/", &json!({}))
            .await
            .unwrap();
        assert_eq!(resp, b"live");
    }
}

#[test_log::test(tokio::test)]
async fn test_decoys_are_not_registered() {
    let mut tree = SocketTree::new();
    tree.add_plain_file("decoy");
    let live = tree.add_instance("real", instance::ok("ok"));

    let client = Client::new(tree.root(), tree.socket_name());
    client.refresh().await.unwrap();
    assert_eq!(client.sockets(), vec![live]);
}

#[test_log::test(tokio::test)]
async fn test_all_dead_sockets_exhaust() {
    let mut tree = SocketTree::new();
    tree.add_dead_socket("a");
    tree.add_dead_socket("b");

    let client = Client::new(tree.root(), tree.socket_name());
    client.refresh().await.unwrap();

    let err = client
        .execute_authorized_request("http://x/", &json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::AllInstancesFailed(_)));
    assert!(err.to_string().contains("failed to connect to socket"));
}

#[test_log::test(tokio::test)]
async fn test_dispatch_before_refresh_has_no_sockets() {
    let mut tree = SocketTree::new();
    tree.add_instance("1", instance::ok("unused"));

    let client = Client::new(tree.root(), tree.socket_name());
    let err = client
        .execute_authorized_request("http://x/", &json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::NoSockets));
}

#[test_log::test(tokio::test)]
async fn test_client_from_config_with_timeout() {
    let mut tree = SocketTree::with_socket_name("api.sock");
    tree.add_instance("1", instance::ok("configured"));

    let config = TestConfigBuilder::new()
        .sockets_root(tree.root())
        .socket_name("api.sock")
        .connect_timeout_ms(Duration::from_secs(2).as_millis() as u64)
        .log_level("debug")
        .build();
    config.validate().unwrap();
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.discovery.sockets_root, tree.root());

    let client = Client::from_config(&config);
    client.refresh().await.unwrap();

    let resp = client
        .execute_authorized_request("http://x/", &json!({}))
        .await
        .unwrap();
    assert_eq!(resp, b"configured");
}
