//! JSON wire format for the live connection.
//!
//! Every frame is a text frame `{"event": "<name>", "data": {...}}` with
//! camelCase field names. Inbound frames decode into [`ClientEvent`],
//! outbound payloads are built as [`ServerEvent`].

use axum::extract::ws::Message;
use serde::{Deserialize, Serialize};

use crate::db::models::{ChatMessage, Notification};

/// In-band error codes carried by `error` events.
pub const ERROR_MALFORMED: u16 = 400;
pub const ERROR_NOT_BOUND: u16 = 401;
pub const ERROR_FORBIDDEN: u16 = 403;
pub const ERROR_ALREADY_BOUND: u16 = 409;
pub const ERROR_TOO_LARGE: u16 = 413;
pub const ERROR_STORE: u16 = 500;

/// Events a client may send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Bind this connection to an identity.
    #[serde(rename_all = "camelCase")]
    AddUser { user_id: String },
    #[serde(rename_all = "camelCase")]
    SendMessage {
        sender_id: String,
        receiver_id: String,
        content: String,
    },
    #[serde(rename_all = "camelCase")]
    BroadcastMessage { sender_name: String, content: String },
}

/// Events the server pushes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Acknowledges a successful `addUser`.
    #[serde(rename_all = "camelCase")]
    UserAdded { user_id: String },
    ReceiveMessage(ChatMessage),
    NewNotification(Notification),
    Error { code: u16, message: String },
}

impl ClientEvent {
    /// Decode a text frame. Missing, empty or blank identity fields and
    /// empty content are treated as malformed.
    pub fn decode(text: &str) -> Result<Self, String> {
        let event: ClientEvent = serde_json::from_str(text).map_err(|e| e.to_string())?;
        event.validate()?;
        Ok(event)
    }

    fn validate(&self) -> Result<(), String> {
        let required: Vec<(&str, &str)> = match self {
            ClientEvent::AddUser { user_id } => vec![("userId", user_id.as_str())],
            ClientEvent::SendMessage {
                sender_id,
                receiver_id,
                content,
            } => vec![
                ("senderId", sender_id.as_str()),
                ("receiverId", receiver_id.as_str()),
                ("content", content.as_str()),
            ],
            ClientEvent::BroadcastMessage {
                sender_name,
                content,
            } => vec![("senderName", sender_name.as_str()), ("content", content.as_str())],
        };

        match required.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((field, _)) => Err(format!("missing field `{}`", field)),
            None => Ok(()),
        }
    }
}

impl ServerEvent {
    pub fn error(code: u16, message: impl Into<String>) -> Self {
        ServerEvent::Error {
            code,
            message: message.into(),
        }
    }

    /// Encode as a WebSocket text frame.
    pub fn to_message(&self) -> Option<Message> {
        match serde_json::to_string(self) {
            Ok(json) => Some(Message::Text(json.into())),
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode server event");
                None
            }
        }
    }
}
