//! End-to-end relay tests
//!
//! Most tests run against the in-memory transport and need nothing else. The
//! Redis test additionally requires `REDIS_URL` and is skipped without it.
//!
//! Run with: cargo test -p integration-tests --test relay_tests

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use integration_tests::{redis_url, test_config, TestServer};
use relay_channel::{create_transport, ChannelTransport, MemoryTransport};
use relay_core::ChatMessage;

const SILENCE: Duration = Duration::from_millis(200);

// ============================================================================
// Relay Scenarios
// ============================================================================

#[tokio::test]
async fn test_two_clients_and_departure() {
    let server = TestServer::start().await.unwrap();
    let mut a = server.connect().await.unwrap();
    let mut b = server.connect().await.unwrap();

    b.send_text("hello").await.unwrap();

    assert_eq!(
        a.recv_text().await.unwrap(),
        "Message from chat_channel: hello by user user"
    );
    assert_eq!(
        b.recv_text().await.unwrap(),
        "Message from chat_channel: hello by user user"
    );

    b.close().await.unwrap();

    assert_eq!(
        a.recv_text().await.unwrap(),
        "Message from chat_channel: A user has left the chat. by user system"
    );
    server.wait_for_connections(1).await.unwrap();
}

#[tokio::test]
async fn test_every_client_receives_broadcast() {
    let server = TestServer::start().await.unwrap();
    let mut clients = Vec::new();
    for _ in 0..10 {
        clients.push(server.connect().await.unwrap());
    }
    assert_eq!(server.connection_count(), 10);

    clients[3].send_text("to everyone").await.unwrap();

    let expected = server.render("to everyone", "user");
    for client in &mut clients {
        assert_eq!(client.recv_text().await.unwrap(), expected);
    }
}

#[tokio::test]
async fn test_messages_from_one_client_keep_order() {
    let server = TestServer::start().await.unwrap();
    let mut sender = server.connect().await.unwrap();
    let mut listener = server.connect().await.unwrap();

    for i in 0..20 {
        sender.send_text(&format!("msg {i}")).await.unwrap();
    }

    for i in 0..20 {
        assert_eq!(
            listener.recv_text().await.unwrap(),
            server.render(&format!("msg {i}"), "user")
        );
    }
}

#[tokio::test]
async fn test_identity_from_query() {
    let server = TestServer::start().await.unwrap();
    let mut alice = server.connect_as("alice").await.unwrap();
    let mut other = server.connect().await.unwrap();

    alice.send_text("hi").await.unwrap();

    assert_eq!(other.recv_text().await.unwrap(), server.render("hi", "alice"));
}

#[tokio::test]
async fn test_custom_topic_and_identity() {
    let config = test_config(&[
        ("RELAY_TOPIC", "lobby"),
        ("RELAY_DEFAULT_IDENTITY", "guest"),
    ])
    .unwrap();
    let server = TestServer::start_with_config(config).await.unwrap();
    let mut client = server.connect().await.unwrap();

    client.send_text("hey").await.unwrap();

    assert_eq!(
        client.recv_text().await.unwrap(),
        "Message from lobby: hey by user guest"
    );
}

#[tokio::test]
async fn test_oversized_frame_is_dropped() {
    let config = test_config(&[("RELAY_MAX_FRAME_BYTES", "16")]).unwrap();
    let server = TestServer::start_with_config(config).await.unwrap();
    let mut sender = server.connect().await.unwrap();
    let mut listener = server.connect().await.unwrap();

    sender.send_text(&"x".repeat(64)).await.unwrap();
    sender.send_text("fits").await.unwrap();

    assert_eq!(listener.recv_text().await.unwrap(), server.render("fits", "user"));
    // The sender is still connected
    assert_eq!(server.connection_count(), 2);
}

// ============================================================================
// Disconnect Tests
// ============================================================================

#[tokio::test]
async fn test_single_departure_per_disconnect() {
    let server = TestServer::start().await.unwrap();
    let mut stays = server.connect().await.unwrap();
    let leaves = server.connect().await.unwrap();

    leaves.close().await.unwrap();

    assert_eq!(
        stays.recv_text().await.unwrap(),
        server.render("A user has left the chat.", "system")
    );
    stays.expect_silence(SILENCE).await.unwrap();
    assert_eq!(server.connection_count(), 1);
}

#[tokio::test]
async fn test_dropped_socket_is_deregistered() {
    let server = TestServer::start().await.unwrap();
    let mut stays = server.connect().await.unwrap();
    let vanishes = server.connect().await.unwrap();

    // No close handshake
    drop(vanishes);

    server.wait_for_connections(1).await.unwrap();
    assert_eq!(
        stays.recv_text().await.unwrap(),
        server.render("A user has left the chat.", "system")
    );
}

#[tokio::test]
async fn test_shutdown_stops_server() {
    let server = TestServer::start().await.unwrap();
    let mut client = server.connect().await.unwrap();
    let url = server.ws_url(None);

    server.shutdown().await.unwrap();

    assert!(client.recv_text().await.is_err());
    assert!(tokio_tungstenite::connect_async(url.as_str()).await.is_err());
}

// ============================================================================
// Channel Tests
// ============================================================================

#[tokio::test]
async fn test_external_publisher_reaches_clients() {
    let transport = Arc::new(MemoryTransport::default());
    let server = TestServer::start_with_transport(test_config(&[]).unwrap(), transport.clone())
        .await
        .unwrap();
    let mut client = server.connect().await.unwrap();

    // Legacy publishers use `user_id`
    transport
        .publish("chat_channel", r#"{"user_id":"bot","content":"beep"}"#)
        .await
        .unwrap();
    transport
        .publish(
            "chat_channel",
            &ChatMessage::new("svc", "boop").to_json().unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(client.recv_text().await.unwrap(), server.render("beep", "bot"));
    assert_eq!(client.recv_text().await.unwrap(), server.render("boop", "svc"));
}

#[tokio::test]
async fn test_malformed_channel_payload_is_skipped() {
    let transport = Arc::new(MemoryTransport::default());
    let server = TestServer::start_with_transport(test_config(&[]).unwrap(), transport.clone())
        .await
        .unwrap();
    let mut client = server.connect().await.unwrap();

    transport.publish("chat_channel", "not json").await.unwrap();
    transport
        .publish("chat_channel", &serde_json::json!({ "content": "no sender" }).to_string())
        .await
        .unwrap();
    client.send_text("still relaying").await.unwrap();

    assert_eq!(
        client.recv_text().await.unwrap(),
        server.render("still relaying", "user")
    );
}

#[tokio::test]
async fn test_relay_survives_subscription_loss() {
    let transport = Arc::new(MemoryTransport::default());
    let server = TestServer::start_with_transport(test_config(&[]).unwrap(), transport.clone())
        .await
        .unwrap();
    let mut client = server.connect().await.unwrap();

    assert!(transport.close_topic("chat_channel"));
    integration_tests::wait_until(Duration::from_secs(5), || {
        transport.subscriber_count("chat_channel") == 1
    })
    .await
    .unwrap();

    client.send_text("after reconnect").await.unwrap();
    assert_eq!(
        client.recv_text().await.unwrap(),
        server.render("after reconnect", "user")
    );
}

#[tokio::test]
async fn test_redis_relays_across_instances() {
    let Some(url) = redis_url() else {
        return;
    };

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let topic = format!("relay_test_{nanos}");
    let config = test_config(&[
        ("CHANNEL_BACKEND", "redis"),
        ("REDIS_URL", url.as_str()),
        ("RELAY_TOPIC", topic.as_str()),
    ])
    .unwrap();

    let first = TestServer::start_with_transport(config.clone(), create_transport(&config).unwrap())
        .await
        .unwrap();
    let second = TestServer::start_with_transport(config.clone(), create_transport(&config).unwrap())
        .await
        .unwrap();

    let mut on_first = first.connect_as("alice").await.unwrap();
    let mut on_second = second.connect().await.unwrap();

    on_first.send_text("across").await.unwrap();

    let expected = format!("Message from {topic}: across by user alice");
    assert_eq!(on_second.recv_text().await.unwrap(), expected);
    assert_eq!(on_first.recv_text().await.unwrap(), expected);
}
