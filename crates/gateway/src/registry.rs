//! Connection registry: at most one live relay session per client id.
//!
//! Each session owns the sender half of the client-facing message
//! channel plus a [`CancellationToken`] that tears down the session's
//! relay task (and with it the backend-facing channel the task owns).
//! Registering a new session for an id always releases the old one
//! first; release is idempotent.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

/// Channel sender half for pushing messages to a client connection.
pub type ClientSender = mpsc::UnboundedSender<Message>;

/// Bookkeeping for one live relay session.
pub struct ClientSession {
    /// Distinguishes this session from earlier ones under the same
    /// client id, so a displaced session's cleanup cannot tear down
    /// its replacement.
    pub session_id: u64,
    /// Outbound channel to the client-facing WebSocket.
    pub sender: ClientSender,
    /// Cancelled on release; the relay task selects on it.
    pub cancel: CancellationToken,
    pub connected_at: DateTime<Utc>,
}

/// All active relay sessions, keyed by client id.
///
/// Thread-safe via interior `RwLock`; wrapped in `Arc` and shared
/// across the application.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, ClientSession>>,
    next_session_id: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            next_session_id: AtomicU64::new(1),
        }
    }

    /// Register a session for `client_id`.
    ///
    /// Any existing session for the id is released first, so the
    /// single-session-per-id invariant holds even when a client
    /// reconnects before its old relay noticed the disconnect.
    /// Returns the receiver half of the message channel, the session's
    /// cancellation token, and the session id for guarded release.
    pub async fn register(
        &self,
        client_id: &str,
    ) -> (mpsc::UnboundedReceiver<Message>, CancellationToken, u64) {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);

        let mut sessions = self.sessions.write().await;
        if let Some(old) = sessions.remove(client_id) {
            tracing::info!(client_id, "Replacing existing session");
            close_session(old);
        }
        sessions.insert(
            client_id.to_string(),
            ClientSession {
                session_id,
                sender: tx,
                cancel: cancel.clone(),
                connected_at: Utc::now(),
            },
        );

        (rx, cancel, session_id)
    }

    /// Release the session for `client_id`, closing its client channel
    /// and cancelling its relay task. Idempotent; unknown ids are a
    /// no-op.
    pub async fn release(&self, client_id: &str) {
        if let Some(session) = self.sessions.write().await.remove(client_id) {
            close_session(session);
            tracing::debug!(client_id, "Session released");
        }
    }

    /// Release only if the live session for `client_id` is still the
    /// one identified by `session_id`. A session that was displaced by
    /// a reconnect uses this so its cleanup cannot tear down the
    /// replacement.
    pub async fn release_if(&self, client_id: &str, session_id: u64) {
        let mut sessions = self.sessions.write().await;
        if sessions
            .get(client_id)
            .is_some_and(|s| s.session_id == session_id)
        {
            if let Some(session) = sessions.remove(client_id) {
                close_session(session);
                tracing::debug!(client_id, "Session released");
            }
        }
    }

    /// Forward a text message to `client_id`.
    ///
    /// Warns and drops the message when no session exists (a late
    /// event after teardown). A send failure releases the session.
    pub async fn send(&self, client_id: &str, text: String) {
        self.forward(client_id, Message::Text(text.into())).await;
    }

    /// Forward a raw binary payload to `client_id`.
    pub async fn send_binary(&self, client_id: &str, payload: Vec<u8>) {
        self.forward(client_id, Message::Binary(payload.into())).await;
    }

    /// Serialize `message` as JSON and forward it to `client_id`.
    pub async fn send_json<T: serde::Serialize>(&self, client_id: &str, message: &T) {
        match serde_json::to_string(message) {
            Ok(text) => self.send(client_id, text).await,
            Err(e) => tracing::error!(client_id, error = %e, "Failed to serialize client message"),
        }
    }

    /// True while a session exists for `client_id`.
    pub async fn contains(&self, client_id: &str) -> bool {
        self.sessions.read().await.contains_key(client_id)
    }

    /// Number of live sessions.
    pub async fn connection_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Send a Ping frame to every connected client.
    pub async fn ping_all(&self) {
        let sessions = self.sessions.read().await;
        for session in sessions.values() {
            let _ = session.sender.send(Message::Ping(Vec::new().into()));
        }
    }

    /// Close every session: Close frame, cancel, clear the map.
    /// Used during graceful shutdown.
    pub async fn shutdown_all(&self) {
        let mut sessions = self.sessions.write().await;
        let count = sessions.len();
        for (_, session) in sessions.drain() {
            close_session(session);
        }
        tracing::info!(count, "Closed all relay sessions");
    }

    async fn forward(&self, client_id: &str, message: Message) {
        let failed = {
            let sessions = self.sessions.read().await;
            match sessions.get(client_id) {
                Some(session) => session.sender.send(message).is_err(),
                None => {
                    tracing::warn!(client_id, "Dropping message for unknown session");
                    false
                }
            }
        };
        if failed {
            tracing::debug!(client_id, "Client channel closed, releasing session");
            self.release(client_id).await;
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn close_session(session: ClientSession) {
    let _ = session.sender.send(Message::Close(None));
    session.cancel.cancel();
}

/// Interval between heartbeat pings (in seconds).
const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Spawn a background task that pings all connected clients
/// periodically so stale connections surface as send failures.
pub fn start_heartbeat(registry: Arc<SessionRegistry>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECS));

        loop {
            interval.tick().await;
            let count = registry.connection_count().await;
            tracing::debug!(count, "Relay session heartbeat ping");
            registry.ping_all().await;
        }
    })
}
