//! WebSocket connection management
//!
//! Represents an active, authenticated WebSocket connection.

use tokio::sync::mpsc;
use uuid::Uuid;

use super::events::ServerEvent;

/// Represents an active WebSocket connection
///
/// Exists only while the transport link is open; never persisted.
#[derive(Debug)]
pub struct Connection {
    /// Unique connection ID, assigned at upgrade
    pub connection_id: Uuid,

    /// Authenticated user ID
    pub user_id: Uuid,

    /// Authenticated username
    pub username: String,

    /// Channel to send events to this connection
    pub sender: mpsc::UnboundedSender<ServerEvent>,
}

impl Connection {
    /// Create a new connection
    pub fn new(user_id: Uuid, username: String, sender: mpsc::UnboundedSender<ServerEvent>) -> Self {
        Self {
            connection_id: Uuid::new_v4(),
            user_id,
            username,
            sender,
        }
    }

    /// Send an event to this connection
    ///
    /// Returns Ok(()) if queued successfully, Err if the connection is closed
    #[allow(clippy::result_large_err)] // Error type is from tokio mpsc, containing the failed event
    pub fn send(&self, event: ServerEvent) -> Result<(), mpsc::error::SendError<ServerEvent>> {
        self.sender.send(event)
    }
}
