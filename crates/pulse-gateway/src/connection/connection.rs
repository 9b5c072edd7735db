//! Individual WebSocket connection
//!
//! One value of [`Connection`] per open socket. The socket task owns the
//! actual sink; everyone else talks to the connection through its bounded
//! frame queue and the forced-close handshake.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Notify, RwLock};

use pulse_common::Identity;
use pulse_core::{ConversationId, Frame, UserId};

use crate::protocol::CloseCode;

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Socket is open and serving frames
    Open,
    /// Close has been requested, socket task is winding down
    Closing,
    /// Socket is gone
    Closed,
}

/// A single client connection to the gateway
pub struct Connection {
    /// Unique connection identifier
    id: String,
    /// Authenticated user
    user_id: UserId,
    /// Display name from the token
    username: String,
    /// When the session's token stops being valid
    token_expires_at: DateTime<Utc>,
    /// Lifecycle state
    state: RwLock<ConnectionState>,
    /// Outbound frame queue into the socket task
    sender: mpsc::Sender<Frame>,
    /// Last heartbeat received from the client
    last_heartbeat: RwLock<Instant>,
    /// Conversations this connection has joined
    rooms: RwLock<HashSet<ConversationId>>,
    /// Close code requested by a forced disconnect
    close_code: RwLock<Option<CloseCode>>,
    /// Wakes the socket task when a forced close is requested
    close_notify: Notify,
    /// When the connection was established
    connected_at: Instant,
}

impl Connection {
    /// Create a new connection for an authenticated identity
    pub fn new(id: String, identity: &Identity, sender: mpsc::Sender<Frame>) -> Arc<Self> {
        Arc::new(Self {
            id,
            user_id: identity.user_id,
            username: identity.username.clone(),
            token_expires_at: identity.expires_at,
            state: RwLock::new(ConnectionState::Open),
            sender,
            last_heartbeat: RwLock::new(Instant::now()),
            rooms: RwLock::new(HashSet::new()),
            close_code: RwLock::new(None),
            close_notify: Notify::new(),
            connected_at: Instant::now(),
        })
    }

    /// Get the connection ID
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the user ID
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Get the username
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// When the session token expires
    #[must_use]
    pub fn token_expires_at(&self) -> DateTime<Utc> {
        self.token_expires_at
    }

    /// Get the current lifecycle state
    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Set the lifecycle state
    pub async fn set_state(&self, state: ConnectionState) {
        *self.state.write().await = state;
    }

    /// Check whether the connection is closed or closing
    pub async fn is_closed(&self) -> bool {
        matches!(
            *self.state.read().await,
            ConnectionState::Closing | ConnectionState::Closed
        )
    }

    /// Record a heartbeat from the client
    pub async fn record_heartbeat(&self) {
        *self.last_heartbeat.write().await = Instant::now();
    }

    /// Time elapsed since the last client heartbeat
    pub async fn time_since_heartbeat(&self) -> Duration {
        self.last_heartbeat.read().await.elapsed()
    }

    /// Track a joined conversation
    pub async fn join_room(&self, conversation_id: ConversationId) {
        self.rooms.write().await.insert(conversation_id);
    }

    /// Forget a joined conversation
    pub async fn leave_room(&self, conversation_id: ConversationId) {
        self.rooms.write().await.remove(&conversation_id);
    }

    /// Check whether this connection has joined a conversation
    pub async fn in_room(&self, conversation_id: ConversationId) -> bool {
        self.rooms.read().await.contains(&conversation_id)
    }

    /// Snapshot of joined conversations
    pub async fn rooms(&self) -> Vec<ConversationId> {
        self.rooms.read().await.iter().copied().collect()
    }

    /// Request that the socket task close with the given code
    ///
    /// Idempotent; the first code wins.
    pub async fn begin_close(&self, code: CloseCode) {
        {
            let mut slot = self.close_code.write().await;
            if slot.is_none() {
                *slot = Some(code);
            }
        }
        self.set_state(ConnectionState::Closing).await;
        self.close_notify.notify_one();
    }

    /// Wait until a forced close is requested, yielding its code
    pub async fn closed(&self) -> CloseCode {
        loop {
            if let Some(code) = *self.close_code.read().await {
                return code;
            }
            self.close_notify.notified().await;
        }
    }

    /// Queue a frame, waiting for capacity
    pub async fn send(&self, frame: Frame) -> Result<(), mpsc::error::SendError<Frame>> {
        self.sender.send(frame).await
    }

    /// Queue a frame without waiting
    ///
    /// Fails when the queue is full, which is how a slow consumer loses
    /// frames instead of stalling the sender.
    pub fn try_send(&self, frame: Frame) -> Result<(), mpsc::error::TrySendError<Frame>> {
        self.sender.try_send(frame)
    }

    /// How long this connection has been open
    #[must_use]
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("username", &self.username)
            .field("age", &self.age())
            .finish_non_exhaustive()
    }
}
