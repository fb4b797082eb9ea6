//! WebSocket event types and serialization
//!
//! Defines all client-to-server and server-to-client event types
//! with type-safe serde serialization. Wire names are camelCase.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use parley_shared::MessageView;

// =============================================================================
// Client-to-Server Events
// =============================================================================

/// Envelope for client events
///
/// `seq` is an optional correlation value echoed back in the matching
/// `ack` / `error` / `messageHistory` response.
#[derive(Debug, Deserialize)]
pub struct ClientRequest {
    #[serde(default)]
    pub seq: Option<u64>,
    #[serde(flatten)]
    pub event: ClientEvent,
}

/// Events sent from client to server
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    /// Send a chat message, optionally as a threaded reply
    SendMessage {
        content: String,
        #[serde(default)]
        reply_to_id: Option<Uuid>,
    },

    /// Signal typing state
    Typing { is_typing: bool },

    /// Mark a message as read
    MarkAsRead { message_id: Uuid },

    /// Request recent message history (request/response, not broadcast)
    GetMessages,
}

// =============================================================================
// Server-to-Client Events
// =============================================================================

/// Events sent from server to client
#[derive(Debug, Serialize, Clone)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Connection acknowledged after successful authentication
    Connected { connection_id: Uuid },

    /// Request acknowledged
    Ack {
        #[serde(skip_serializing_if = "Option::is_none")]
        seq: Option<u64>,
        success: bool,
    },

    /// Request failed (sent to the caller only, never broadcast)
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        seq: Option<u64>,
        message: String,
    },

    /// A user joined; carries the full presence snapshot
    UserJoined {
        username: String,
        connected_users: Vec<String>,
    },

    /// A user left; carries the updated presence snapshot
    UserLeft {
        username: String,
        connected_users: Vec<String>,
    },

    /// New message, fully resolved (sent to all connections including sender)
    NewMessage(MessageView),

    /// Typing state changed (sent to all connections except the originator)
    UserTyping {
        user_id: Uuid,
        username: String,
        is_typing: bool,
    },

    /// Read receipt update
    MessageRead {
        message_id: Uuid,
        user_id: Uuid,
        read_by: Vec<Uuid>,
    },

    /// Recent message history (response to `getMessages`)
    MessageHistory {
        #[serde(skip_serializing_if = "Option::is_none")]
        seq: Option<u64>,
        messages: Vec<MessageView>,
    },
}

impl ServerEvent {
    /// Successful acknowledgment for a client request
    pub fn ack(seq: Option<u64>) -> Self {
        ServerEvent::Ack { seq, success: true }
    }

    /// Caller-only error response
    pub fn error(seq: Option<u64>, message: impl Into<String>) -> Self {
        ServerEvent::Error {
            seq,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_event_deserialization() {
        let json = r#"{"type":"sendMessage","content":"hi","replyToId":null}"#;
        let req: ClientRequest = serde_json::from_str(json).unwrap();
        assert!(req.seq.is_none());
        match req.event {
            ClientEvent::SendMessage { content, reply_to_id } => {
                assert_eq!(content, "hi");
                assert!(reply_to_id.is_none());
            }
            _ => panic!("Expected SendMessage event"),
        }
    }

    #[test]
    fn test_client_event_with_seq() {
        let json = r#"{"seq":7,"type":"typing","isTyping":true}"#;
        let req: ClientRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.seq, Some(7));
        assert!(matches!(req.event, ClientEvent::Typing { is_typing: true }));
    }

    #[test]
    fn test_get_messages_deserialization() {
        let json = r#"{"type":"getMessages"}"#;
        let req: ClientRequest = serde_json::from_str(json).unwrap();
        assert!(matches!(req.event, ClientEvent::GetMessages));
    }

    #[test]
    fn test_server_event_serialization() {
        let event = ServerEvent::UserTyping {
            user_id: Uuid::new_v4(),
            username: "alice".to_string(),
            is_typing: false,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "userTyping");
        assert_eq!(json["isTyping"], false);
        assert_eq!(json["username"], "alice");
    }

    #[test]
    fn test_ack_serialization() {
        let json = serde_json::to_string(&ServerEvent::ack(None)).unwrap();
        assert_eq!(json, r#"{"type":"ack","success":true}"#);

        let json = serde_json::to_value(ServerEvent::ack(Some(3))).unwrap();
        assert_eq!(json["seq"], 3);
    }

    #[test]
    fn test_error_event_serialization() {
        let event = ServerEvent::error(None, "Message not found");
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("error"));
        assert!(json.contains("Message not found"));
    }
}
