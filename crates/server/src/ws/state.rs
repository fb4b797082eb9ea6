//! Hub state shared across all WebSocket connections
//!
//! Owns the connection map, the presence registry, and the typing tracker,
//! and provides the broadcast fan-out. There is a single implicit room:
//! every broadcast reaches every live connection.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use super::connection::Connection;
use super::events::ServerEvent;
use super::presence::PresenceRegistry;
use super::typing::{TypingExpired, TypingTracker};

/// Hub state shared across all connections
#[derive(Clone)]
pub struct HubState {
    /// All active connections indexed by connection_id
    connections: Arc<RwLock<HashMap<Uuid, Arc<Connection>>>>,

    /// Registration-ordered presence index
    pub presence: Arc<PresenceRegistry>,

    /// Debounced typing state
    pub typing: Arc<TypingTracker>,
}

impl HubState {
    /// Create hub state and start the typing-expiry drain task
    pub fn new(typing_expiry: Duration) -> Self {
        let (typing, expired_rx) = TypingTracker::new(typing_expiry);
        let state = Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
            presence: Arc::new(PresenceRegistry::new()),
            typing: Arc::new(typing),
        };
        state.spawn_expiry_drain(expired_rx);
        state
    }

    /// Drain generation-tagged expiry commands posted by typing timers
    ///
    /// Stale commands are discarded by the tracker; live ones become a
    /// "stopped typing" broadcast to everyone except the originator.
    fn spawn_expiry_drain(&self, mut expired_rx: mpsc::UnboundedReceiver<TypingExpired>) {
        let hub = self.clone();
        tokio::spawn(async move {
            while let Some(cmd) = expired_rx.recv().await {
                if let Some((connection_id, username)) =
                    hub.typing.expire(cmd.user_id, cmd.generation).await
                {
                    tracing::debug!(user_id = %cmd.user_id, "Typing indicator expired");
                    hub.broadcast_except(
                        connection_id,
                        ServerEvent::UserTyping {
                            user_id: cmd.user_id,
                            username,
                            is_typing: false,
                        },
                    )
                    .await;
                }
            }
        });
    }

    /// Add a connection
    pub async fn add_connection(&self, conn: Connection) -> Arc<Connection> {
        let conn = Arc::new(conn);
        let mut connections = self.connections.write().await;
        connections.insert(conn.connection_id, Arc::clone(&conn));

        tracing::info!(
            connection_id = %conn.connection_id,
            user_id = %conn.user_id,
            total_connections = connections.len(),
            "WebSocket connection added"
        );

        conn
    }

    /// Remove a connection
    pub async fn remove_connection(&self, connection_id: Uuid) -> Option<Arc<Connection>> {
        let mut connections = self.connections.write().await;
        let removed = connections.remove(&connection_id);

        if let Some(conn) = &removed {
            tracing::info!(
                connection_id = %connection_id,
                user_id = %conn.user_id,
                remaining_connections = connections.len(),
                "WebSocket connection removed"
            );
        }

        removed
    }

    /// Get total number of active connections
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Broadcast an event to all connections
    ///
    /// Silently ignores send errors (closed connections are cleaned up by
    /// their own socket task). No lock is held across an await: senders are
    /// unbounded queues drained by per-connection writer tasks.
    pub async fn broadcast(&self, event: ServerEvent) {
        self.fan_out(None, event).await;
    }

    /// Broadcast an event to all connections except one
    pub async fn broadcast_except(&self, skip: Uuid, event: ServerEvent) {
        self.fan_out(Some(skip), event).await;
    }

    async fn fan_out(&self, skip: Option<Uuid>, event: ServerEvent) {
        let connections = self.connections.read().await;
        let mut success_count = 0;
        let mut failed_count = 0;

        for conn in connections.values() {
            if Some(conn.connection_id) == skip {
                continue;
            }
            match conn.send(event.clone()) {
                Ok(()) => success_count += 1,
                Err(_) => {
                    failed_count += 1;
                    tracing::warn!(
                        connection_id = %conn.connection_id,
                        "Failed to queue event for connection (likely closed)"
                    );
                }
            }
        }

        tracing::debug!(
            event_type = ?event,
            recipients = success_count,
            failed = failed_count,
            "Broadcast event"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn test_conn(username: &str) -> (Connection, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Connection::new(Uuid::new_v4(), username.to_string(), tx), rx)
    }

    #[tokio::test]
    async fn test_add_and_remove_connection() {
        let hub = HubState::new(Duration::from_millis(3000));
        let (conn, _rx) = test_conn("alice");
        let connection_id = conn.connection_id;

        let added = hub.add_connection(conn).await;
        assert_eq!(hub.connection_count().await, 1);
        assert_eq!(added.username, "alice");

        assert!(hub.remove_connection(connection_id).await.is_some());
        assert_eq!(hub.connection_count().await, 0);
        assert!(hub.remove_connection(connection_id).await.is_none());
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all() {
        let hub = HubState::new(Duration::from_millis(3000));
        let (conn1, mut rx1) = test_conn("alice");
        let (conn2, mut rx2) = test_conn("bob");

        hub.add_connection(conn1).await;
        hub.add_connection(conn2).await;

        hub.broadcast(ServerEvent::ack(None)).await;

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_broadcast_except_skips_originator() {
        let hub = HubState::new(Duration::from_millis(3000));
        let (conn1, mut rx1) = test_conn("alice");
        let (conn2, mut rx2) = test_conn("bob");
        let originator = conn1.connection_id;

        hub.add_connection(conn1).await;
        hub.add_connection(conn2).await;

        hub.broadcast_except(originator, ServerEvent::ack(None)).await;

        assert!(rx1.try_recv().is_err());
        assert!(rx2.try_recv().is_ok());
    }
}
