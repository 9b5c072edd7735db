//! Connection registry
//!
//! Per-instance index of open connections: by connection ID, by user,
//! and by joined conversation. Delivery to a room walks the room index
//! and queues onto each connection without blocking; a full queue drops
//! that connection's copy of the frame.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;

use pulse_common::Identity;
use pulse_core::{ConversationId, Frame, UserId};

use super::connection::{Connection, ConnectionState};
use crate::protocol::CloseCode;

/// Registry of all connections on this gateway instance
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    /// All connections by connection ID
    connections: DashMap<String, Arc<Connection>>,
    /// Connection IDs by user (one user can hold several sockets)
    user_connections: DashMap<UserId, HashSet<String>>,
    /// Connection IDs by joined conversation
    room_connections: DashMap<ConversationId, HashSet<String>>,
}

impl ConnectionRegistry {
    /// Create a new empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new registry wrapped in an `Arc`
    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a freshly upgraded connection
    pub fn register(
        &self,
        connection_id: String,
        identity: &Identity,
        sender: mpsc::Sender<Frame>,
    ) -> Arc<Connection> {
        let connection = Connection::new(connection_id.clone(), identity, sender);

        self.connections
            .insert(connection_id.clone(), connection.clone());
        self.user_connections
            .entry(identity.user_id)
            .or_default()
            .insert(connection_id.clone());

        tracing::debug!(
            connection_id = %connection_id,
            user_id = %identity.user_id,
            "Connection registered"
        );

        connection
    }

    /// Remove a connection and unindex it everywhere
    ///
    /// Returns the conversations that now have no local connection at
    /// all, so the caller can release their fabric channels.
    pub async fn remove(&self, connection_id: &str) -> Vec<ConversationId> {
        let mut vacated = Vec::new();

        let Some((_, connection)) = self.connections.remove(connection_id) else {
            return vacated;
        };
        connection.set_state(ConnectionState::Closed).await;

        let user_id = connection.user_id();
        self.user_connections.alter(&user_id, |_, mut ids| {
            ids.remove(connection_id);
            ids
        });
        self.user_connections.retain(|_, ids| !ids.is_empty());

        for room in connection.rooms().await {
            self.room_connections.alter(&room, |_, mut ids| {
                ids.remove(connection_id);
                ids
            });
            if self
                .room_connections
                .remove_if(&room, |_, ids| ids.is_empty())
                .is_some()
            {
                vacated.push(room);
            }
        }

        tracing::debug!(
            connection_id = %connection_id,
            user_id = %user_id,
            vacated = vacated.len(),
            "Connection removed"
        );

        vacated
    }

    /// Get a connection by ID
    #[must_use]
    pub fn get(&self, connection_id: &str) -> Option<Arc<Connection>> {
        self.connections
            .get(connection_id)
            .map(|entry| entry.clone())
    }

    /// Get all connections for a user
    #[must_use]
    pub fn get_user_connections(&self, user_id: UserId) -> Vec<Arc<Connection>> {
        self.user_connections
            .get(&user_id)
            .map(|ids| ids.iter().filter_map(|id| self.get(id)).collect())
            .unwrap_or_default()
    }

    /// Record a join, returning whether this was the first local
    /// connection in the conversation
    ///
    /// `None` means the connection is not registered. Re-joining is a
    /// no-op and reports `Some(false)`.
    pub async fn join(
        &self,
        connection_id: &str,
        conversation_id: ConversationId,
    ) -> Option<bool> {
        let connection = self.get(connection_id)?;
        connection.join_room(conversation_id).await;

        let mut members = self.room_connections.entry(conversation_id).or_default();
        let first_local = members.is_empty();
        members.insert(connection_id.to_string());
        drop(members);

        tracing::trace!(
            connection_id = %connection_id,
            conversation_id = %conversation_id,
            first_local,
            "Connection joined conversation"
        );

        Some(first_local)
    }

    /// Record a leave, returning whether the conversation now has no
    /// local connections left
    ///
    /// `None` means the connection is not registered. Leaving a
    /// conversation that was never joined reports `Some(false)`.
    pub async fn leave(
        &self,
        connection_id: &str,
        conversation_id: ConversationId,
    ) -> Option<bool> {
        let connection = self.get(connection_id)?;
        connection.leave_room(conversation_id).await;

        self.room_connections.alter(&conversation_id, |_, mut ids| {
            ids.remove(connection_id);
            ids
        });
        let last_local = self
            .room_connections
            .remove_if(&conversation_id, |_, ids| ids.is_empty())
            .is_some();

        tracing::trace!(
            connection_id = %connection_id,
            conversation_id = %conversation_id,
            last_local,
            "Connection left conversation"
        );

        Some(last_local)
    }

    /// Get all connections joined to a conversation
    #[must_use]
    pub fn get_room_connections(&self, conversation_id: ConversationId) -> Vec<Arc<Connection>> {
        self.room_connections
            .get(&conversation_id)
            .map(|ids| ids.iter().filter_map(|id| self.get(id)).collect())
            .unwrap_or_default()
    }

    /// Deliver a frame to every local connection in a conversation
    ///
    /// Returns how many connections accepted the frame. Connections
    /// with a full queue are skipped and logged, never waited on.
    pub fn deliver_local(&self, conversation_id: ConversationId, frame: &Frame) -> usize {
        let mut delivered = 0;

        for connection in self.get_room_connections(conversation_id) {
            match connection.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        connection_id = %connection.id(),
                        user_id = %connection.user_id(),
                        frame = frame.frame_type(),
                        error = %e,
                        "Dropped frame for slow connection"
                    );
                }
            }
        }

        tracing::trace!(
            conversation_id = %conversation_id,
            frame = frame.frame_type(),
            delivered,
            "Delivered frame to conversation"
        );

        delivered
    }

    /// Deliver a frame to every connection on this instance
    pub fn broadcast_all(&self, frame: &Frame) -> usize {
        let mut delivered = 0;

        for entry in self.connections.iter() {
            match entry.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        connection_id = %entry.id(),
                        frame = frame.frame_type(),
                        error = %e,
                        "Dropped frame for slow connection"
                    );
                }
            }
        }

        tracing::trace!(
            frame = frame.frame_type(),
            delivered,
            "Broadcast frame to all connections"
        );

        delivered
    }

    /// Force a connection to close with the given code
    ///
    /// Returns whether the connection was found. The socket task picks
    /// up the request and performs the actual close.
    pub async fn disconnect(&self, connection_id: &str, code: CloseCode) -> bool {
        let Some(connection) = self.get(connection_id) else {
            return false;
        };

        tracing::debug!(
            connection_id = %connection_id,
            code = %code,
            "Forcing disconnect"
        );
        connection.begin_close(code).await;
        true
    }

    /// Close every connection for shutdown
    pub async fn shutdown_all(&self) -> usize {
        let connections: Vec<Arc<Connection>> =
            self.connections.iter().map(|entry| entry.clone()).collect();
        let count = connections.len();

        for connection in connections {
            connection.begin_close(CloseCode::Shutdown).await;
        }

        if count > 0 {
            tracing::info!(count, "Closing all connections for shutdown");
        }
        count
    }

    /// Total number of connections
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Number of distinct users with at least one connection
    #[must_use]
    pub fn user_count(&self) -> usize {
        self.user_connections.len()
    }

    /// Number of conversations with at least one local connection
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.room_connections.len()
    }
}
