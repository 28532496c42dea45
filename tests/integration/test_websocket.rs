//! Integration tests for live session events over WebSocket.
//!
//! These tests connect real clients to `/ws` and check that every session
//! transition reaches them in order.

mod support;

use std::sync::Arc;
use std::time::Duration;

use futures::SinkExt;
use futures::StreamExt;
use serde_json::json;
use support::{orchestrator_for, spawn_upstream, spawn_vibe_server, MockUpstream, API_KEY, IMAGE_ONE};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tungstenite::Message;
use vibe_orchestrator::{Credential, ErrorKind, ImagePolicy, OperationKind, SessionEvent};

/// Helper type for WebSocket client
type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn setup(prompt: &str) -> (Arc<MockUpstream>, vibe_orchestrator::Orchestrator, String) {
    let mock = Arc::new(MockUpstream::default());
    let base_url = spawn_upstream(Arc::clone(&mock)).await;
    let orchestrator = orchestrator_for(
        &base_url,
        prompt,
        ImagePolicy::Retain,
        Credential::new(API_KEY),
    );
    let addr = spawn_vibe_server(orchestrator.clone()).await;
    (mock, orchestrator, addr)
}

/// Connects a WebSocket client to the server at `addr`.
async fn connect_client(addr: &str) -> WsClient {
    let (ws_stream, _) = connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("Failed to connect to WebSocket");
    ws_stream
}

/// Receives the next text message and parses it as a `SessionEvent`.
/// Answers ping frames along the way.
async fn receive_event(client: &mut WsClient) -> SessionEvent {
    loop {
        let msg = timeout(Duration::from_secs(5), client.next())
            .await
            .expect("Timeout waiting for message")
            .expect("Stream ended")
            .expect("WebSocket error");

        match msg {
            Message::Text(text) => {
                return serde_json::from_str(&text).expect("Failed to parse event");
            }
            Message::Ping(data) => {
                client
                    .send(Message::Pong(data))
                    .await
                    .expect("Failed to send pong");
            }
            Message::Pong(_) => {}
            other => panic!("Expected text message, got: {other:?}"),
        }
    }
}

// ============================================================================
// Connection Tests
// ============================================================================

/// A new client first receives the current snapshot.
#[tokio::test]
async fn test_client_receives_connected_event_with_snapshot() {
    let (_mock, _orchestrator, addr) = setup("a quiet harbor at dawn").await;

    let mut client = connect_client(&addr).await;
    let event = receive_event(&mut client).await;

    let SessionEvent::Connected(payload) = event else {
        panic!("Expected Connected event, got: {event:?}");
    };
    assert_eq!(payload.state.prompt_text, "a quiet harbor at dawn");
    assert!(payload.state.image.is_none());
    assert!(!payload.state.busy);
}

/// The snapshot reflects work done before the client connected.
#[tokio::test]
async fn test_connected_event_contains_current_image() {
    let (mock, orchestrator, addr) = setup("a dog").await;
    mock.reply_image_ok(IMAGE_ONE);
    assert!(orchestrator.generate("a dog").await.is_success());

    let mut client = connect_client(&addr).await;
    let SessionEvent::Connected(payload) = receive_event(&mut client).await else {
        panic!("Expected Connected event");
    };
    assert_eq!(payload.state.image.unwrap().data(), IMAGE_ONE);
}

// ============================================================================
// Transition Tests
// ============================================================================

/// A successful generation emits started then succeeded.
#[tokio::test]
async fn test_generation_events_in_order() {
    let (mock, orchestrator, addr) = setup("a dog").await;
    mock.reply_image_ok(IMAGE_ONE);

    let mut client = connect_client(&addr).await;
    receive_event(&mut client).await;

    assert!(orchestrator.generate("a dog").await.is_success());

    let SessionEvent::OperationStarted(started) = receive_event(&mut client).await else {
        panic!("Expected OperationStarted event");
    };
    assert_eq!(started.operation, OperationKind::Generate);

    let SessionEvent::OperationSucceeded(done) = receive_event(&mut client).await else {
        panic!("Expected OperationSucceeded event");
    };
    assert_eq!(done.operation, OperationKind::Generate);
}

/// A failed generation emits started then failed with the recorded error.
#[tokio::test]
async fn test_failed_generation_event() {
    let (mock, orchestrator, addr) = setup("sunset").await;
    mock.reply_image(500, "boom");

    let mut client = connect_client(&addr).await;
    receive_event(&mut client).await;

    orchestrator.generate("sunset").await;

    assert!(matches!(
        receive_event(&mut client).await,
        SessionEvent::OperationStarted(_)
    ));
    let SessionEvent::OperationFailed(payload) = receive_event(&mut client).await else {
        panic!("Expected OperationFailed event");
    };
    assert_eq!(payload.error.kind, ErrorKind::Endpoint);
    assert_eq!(payload.error.operation, OperationKind::Generate);
}

/// Validation failures are broadcast without a started event.
#[tokio::test]
async fn test_validation_failure_event() {
    let (_mock, orchestrator, addr) = setup("").await;

    let mut client = connect_client(&addr).await;
    receive_event(&mut client).await;

    orchestrator.enhance().await;

    let SessionEvent::OperationFailed(payload) = receive_event(&mut client).await else {
        panic!("Expected OperationFailed event");
    };
    assert_eq!(payload.error.kind, ErrorKind::Validation);
    assert_eq!(payload.error.operation, OperationKind::Enhance);
}

/// An enhancement over HTTP reaches the client as a prompt change.
#[tokio::test]
async fn test_api_enhance_triggers_websocket_events() {
    let (mock, _orchestrator, addr) = setup("a dog").await;
    mock.reply_text_ok("  An epic dog under northern lights  ");

    let mut client = connect_client(&addr).await;
    receive_event(&mut client).await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/api/enhance"))
        .send()
        .await
        .expect("Failed to call enhance");
    assert!(response.status().is_success());

    assert!(matches!(
        receive_event(&mut client).await,
        SessionEvent::OperationStarted(_)
    ));
    let SessionEvent::PromptChanged(payload) = receive_event(&mut client).await else {
        panic!("Expected PromptChanged event");
    };
    assert_eq!(payload.prompt_text, "An epic dog under northern lights");
    assert!(matches!(
        receive_event(&mut client).await,
        SessionEvent::OperationSucceeded(_)
    ));
}

// ============================================================================
// Multiple Client Tests
// ============================================================================

/// Prompt edits are broadcast to every connected client.
#[tokio::test]
async fn test_events_broadcast_to_all_clients() {
    let (_mock, _orchestrator, addr) = setup("a dog").await;

    let mut first = connect_client(&addr).await;
    let mut second = connect_client(&addr).await;
    receive_event(&mut first).await;
    receive_event(&mut second).await;

    reqwest::Client::new()
        .put(format!("http://{addr}/api/prompt"))
        .json(&json!({ "prompt": "a cat" }))
        .send()
        .await
        .expect("Failed to set prompt");

    for client in [&mut first, &mut second] {
        let SessionEvent::PromptChanged(payload) = receive_event(client).await else {
            panic!("Expected PromptChanged event");
        };
        assert_eq!(payload.prompt_text, "a cat");
    }
}

/// The server keeps serving after a client disconnects.
#[tokio::test]
async fn test_server_continues_after_client_disconnect() {
    let (_mock, orchestrator, addr) = setup("a dog").await;

    let mut leaving = connect_client(&addr).await;
    receive_event(&mut leaving).await;
    leaving.close(None).await.ok();
    drop(leaving);

    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut staying = connect_client(&addr).await;
    receive_event(&mut staying).await;

    orchestrator.set_prompt("still here").await;
    let SessionEvent::PromptChanged(payload) = receive_event(&mut staying).await else {
        panic!("Expected PromptChanged event");
    };
    assert_eq!(payload.prompt_text, "still here");
}
