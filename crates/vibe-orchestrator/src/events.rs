//! Session events and WebSocket streaming for live re-rendering.
//!
//! The orchestrator broadcasts a [`SessionEvent`] at every state transition.
//! Front ends subscribe over `/ws` and re-read state (or just the fields in
//! the payload) whenever an event arrives.
//!
//! # Event Types
//!
//! - `connected` - Sent when a client connects, includes the current snapshot
//! - `operation_started` - An attempt entered `Pending`
//! - `operation_succeeded` - An attempt settled successfully
//! - `operation_failed` - An attempt settled with an error (including validation)
//! - `prompt_changed` - The prompt was edited or enhanced

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::{interval_at, Instant, Interval};
use tracing::{debug, info, warn};

use crate::api::AppState;
use crate::session::{ErrorInfo, OperationKind, SessionSnapshot};

// ============================================================================
// Event Payloads
// ============================================================================

/// Payload for the `connected` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectedPayload {
    /// The current session snapshot.
    pub state: SessionSnapshot,
}

/// Payload for `operation_started` and `operation_succeeded`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationPayload {
    /// Which operation transitioned.
    pub operation: OperationKind,
    /// When the transition happened.
    pub timestamp: DateTime<Utc>,
}

/// Payload for the `operation_failed` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationFailedPayload {
    /// The recorded error, as it now appears in `last_error`.
    pub error: ErrorInfo,
}

/// Payload for the `prompt_changed` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptChangedPayload {
    /// The new prompt text.
    pub prompt_text: String,
}

// ============================================================================
// Event Enum
// ============================================================================

/// Events describing session state transitions.
///
/// Serialized as JSON objects with "event" and "payload" fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Sent when a client connects.
    Connected(ConnectedPayload),
    /// An attempt started.
    OperationStarted(OperationPayload),
    /// An attempt succeeded.
    OperationSucceeded(OperationPayload),
    /// An attempt failed.
    OperationFailed(OperationFailedPayload),
    /// The prompt text changed.
    PromptChanged(PromptChangedPayload),
}

impl SessionEvent {
    /// Creates a `Connected` event with the current snapshot.
    #[must_use]
    pub const fn connected(state: SessionSnapshot) -> Self {
        Self::Connected(ConnectedPayload { state })
    }

    /// Creates an `OperationStarted` event.
    #[must_use]
    pub fn operation_started(operation: OperationKind) -> Self {
        Self::OperationStarted(OperationPayload {
            operation,
            timestamp: Utc::now(),
        })
    }

    /// Creates an `OperationSucceeded` event.
    #[must_use]
    pub fn operation_succeeded(operation: OperationKind) -> Self {
        Self::OperationSucceeded(OperationPayload {
            operation,
            timestamp: Utc::now(),
        })
    }

    /// Creates an `OperationFailed` event.
    #[must_use]
    pub const fn operation_failed(error: ErrorInfo) -> Self {
        Self::OperationFailed(OperationFailedPayload { error })
    }

    /// Creates a `PromptChanged` event.
    #[must_use]
    pub fn prompt_changed(prompt_text: impl Into<String>) -> Self {
        Self::PromptChanged(PromptChangedPayload {
            prompt_text: prompt_text.into(),
        })
    }

    /// Returns the event name as a string.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Connected(_) => "connected",
            Self::OperationStarted(_) => "operation_started",
            Self::OperationSucceeded(_) => "operation_succeeded",
            Self::OperationFailed(_) => "operation_failed",
            Self::PromptChanged(_) => "prompt_changed",
        }
    }
}

/// Events buffered per subscriber before it starts lagging.
const EVENT_CAPACITY: usize = 64;

/// Fan-out of session events to every connected client.
///
/// Nothing is replayed: a client that connects late gets the current
/// snapshot in its `connected` event instead.
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBroadcaster {
    /// Creates a broadcaster buffering `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            sender: broadcast::channel(capacity).0,
        }
    }

    /// Registers a new subscriber.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Publishes `event` and returns how many subscribers will see it.
    pub fn publish(&self, event: SessionEvent) -> usize {
        self.sender.send(event).unwrap_or_default()
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(EVENT_CAPACITY)
    }
}

// ============================================================================
// WebSocket Handler
// ============================================================================

/// Liveness tracking for one socket.
///
/// A ping goes out every `PING_EVERY`; the socket is dropped once
/// `PONG_GRACE` pings in a row go unanswered.
struct Heartbeat {
    ticker: Interval,
    unanswered: u8,
}

const PING_EVERY: Duration = Duration::from_secs(30);
const PONG_GRACE: u8 = 3;

impl Heartbeat {
    fn new() -> Self {
        // interval_at skips the immediate first tick
        let ticker = interval_at(Instant::now() + PING_EVERY, PING_EVERY);
        Self {
            ticker,
            unanswered: 0,
        }
    }

    fn pong(&mut self) {
        self.unanswered = 0;
    }

    /// Records a ping about to be sent; `false` means the peer is gone.
    fn ping(&mut self) -> bool {
        if self.unanswered >= PONG_GRACE {
            return false;
        }
        self.unanswered += 1;
        true
    }
}

fn encode(event: &SessionEvent) -> Option<Message> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Message::Text(json)),
        Err(e) => {
            warn!(event = event.event_name(), error = %e, "Dropping unserializable event");
            None
        }
    }
}

/// `GET /ws`: upgrades to a socket streaming [`SessionEvent`]s.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| stream_events(socket, state))
}

async fn stream_events(socket: WebSocket, state: Arc<AppState>) {
    // Subscribe first so no transition falls between snapshot and stream
    let mut events = state.orchestrator.broadcaster().subscribe();
    let greeting = SessionEvent::connected(state.orchestrator.snapshot().await);

    let (mut tx, mut rx) = socket.split();
    let Some(greeting) = encode(&greeting) else {
        return;
    };
    if tx.send(greeting).await.is_err() {
        return;
    }
    info!("Event stream opened");

    let mut heartbeat = Heartbeat::new();
    let reason = loop {
        let outgoing = tokio::select! {
            frame = rx.next() => match frame {
                Some(Ok(Message::Pong(_))) => {
                    heartbeat.pong();
                    continue;
                }
                Some(Ok(Message::Ping(payload))) => Message::Pong(payload),
                Some(Ok(Message::Close(_))) | None => break "client closed",
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    debug!(error = %e, "Socket read failed");
                    break "read error";
                }
            },
            event = events.recv() => match event {
                Ok(event) => match encode(&event) {
                    Some(message) => message,
                    None => continue,
                },
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "Subscriber fell behind; events skipped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break "broadcaster closed",
            },
            _ = heartbeat.ticker.tick() => {
                if !heartbeat.ping() {
                    break "heartbeat timeout";
                }
                Message::Ping(Vec::new())
            }
        };

        if tx.send(outgoing).await.is_err() {
            break "write failed";
        }
    };

    info!(reason, "Event stream closed");
}

// ============================================================================
// Tests
// ============================================================================
