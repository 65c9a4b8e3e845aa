//! Wire event types exchanged between clients and the coordinator.
//!
//! Every frame is a JSON object tagged by a `type` field; unknown or
//! malformed frames are answered with a private `error_message`.

use serde::{Deserialize, Serialize};

use crate::core::message::ChatMessage;

/// Client-to-server events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Request a display identity for this connection.
    #[serde(rename = "set_username")]
    SetUsername { username: String },

    /// Submit a message body for admission to the room.
    #[serde(rename = "send_message")]
    SendMessage { message: String },
}

/// Server-to-client events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Sent once when the socket is established, before any negotiation.
    #[serde(rename = "connected")]
    Connected { connection_id: String },

    /// Identity negotiation failed; the connection may retry.
    #[serde(rename = "username_error")]
    UsernameError { message: String },

    /// The rolling history, sent to a connection on successful
    /// negotiation only.
    #[serde(rename = "chat_history")]
    ChatHistory { messages: Vec<ChatMessage> },

    /// An accepted message, fanned out to every live connection. The
    /// message fields sit beside `type` at the top level.
    #[serde(rename = "new_message")]
    NewMessage(ChatMessage),

    /// A private admission or ingestion error for one connection.
    #[serde(rename = "error_message")]
    ErrorMessage { message: String },

    /// Refreshed count of identified participants.
    #[serde(rename = "user_count")]
    UserCount { count: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn test_client_events_parse_from_tagged_json() {
        let event: ClientEvent =
            serde_json::from_str(r#"{"type":"set_username","username":"alice"}"#).unwrap();
        assert!(matches!(
            event,
            ClientEvent::SetUsername { username } if username == "alice"
        ));

        let event: ClientEvent =
            serde_json::from_str(r#"{"type":"send_message","message":"hi"}"#).unwrap();
        assert!(matches!(
            event,
            ClientEvent::SendMessage { message } if message == "hi"
        ));
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        assert!(serde_json::from_str::<ClientEvent>(r#"{"type":"shutdown"}"#).is_err());
        assert!(serde_json::from_str::<ClientEvent>("not json").is_err());
    }

    #[test]
    fn test_new_message_flattens_fields_beside_type() {
        let message = ChatMessage::system("x joined the chat".to_string(), Utc::now());
        let json = serde_json::to_value(&ServerEvent::NewMessage(message)).unwrap();
        assert_eq!(json["type"], "new_message");
        assert_eq!(json["senderId"], "system");
        assert_eq!(json["isSystem"], true);
        assert!(json["id"].is_string());
    }

    #[test]
    fn test_server_events_round_trip() {
        let event = ServerEvent::Connected {
            connection_id: Uuid::new_v4().to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let parsed: ServerEvent = serde_json::from_str(&json).unwrap();
        assert!(matches!(parsed, ServerEvent::Connected { .. }));

        let json = serde_json::to_string(&ServerEvent::UserCount { count: 7 }).unwrap();
        assert_eq!(json, r#"{"type":"user_count","count":7}"#);
    }
}
