use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::registry::Session;

/// Who produced a message. Serialized as a bare string on the wire:
/// `"system"`, `"bot"`, or the sender's opaque user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SenderId {
    System,
    Bot,
    User(String),
}

impl From<String> for SenderId {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "system" => SenderId::System,
            "bot" => SenderId::Bot,
            _ => SenderId::User(raw),
        }
    }
}

impl From<SenderId> for String {
    fn from(sender: SenderId) -> Self {
        match sender {
            SenderId::System => "system".to_string(),
            SenderId::Bot => "bot".to_string(),
            SenderId::User(id) => id,
        }
    }
}

/// A single timed mouth shape within a synthesized audio clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MouthCue {
    /// Offset of the cue start within the clip, in seconds.
    pub start: f64,
    /// Offset of the cue end within the clip, in seconds.
    pub end: f64,
    /// Viseme label for this span.
    pub value: String,
}

/// Timed viseme track accompanying a synthesized bot reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisemeTrack {
    pub cues: Vec<MouthCue>,
}

/// One chat message. Immutable once accepted: the coordinator never
/// rewrites a message after it has been appended to the room history.
///
/// The enrichment fields (`audio`, `visemes`, `expression`, `animation`)
/// are only ever present on bot replies whose speech synthesis
/// succeeded; consumers must treat them as optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    pub sender_id: SenderId,
    pub sender_name: String,
    pub body: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub is_system: bool,
    pub is_bot: bool,
    pub mentions_bot: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reply_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub audio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub visemes: Option<VisemeTrack>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub expression: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub animation: Option<String>,
}

impl ChatMessage {
    /// A message sent by an identified participant.
    pub fn user(session: &Session, body: String, mentions_bot: bool, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender_id: SenderId::User(session.user_id.clone()),
            sender_name: session.username.clone(),
            body,
            timestamp: now,
            is_system: false,
            is_bot: false,
            mentions_bot,
            reply_to: None,
            audio: None,
            visemes: None,
            expression: None,
            animation: None,
        }
    }

    /// A room announcement (joins, departures).
    pub fn system(body: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender_id: SenderId::System,
            sender_name: "System".to_string(),
            body,
            timestamp: now,
            is_system: true,
            is_bot: false,
            mentions_bot: false,
            reply_to: None,
            audio: None,
            visemes: None,
            expression: None,
            animation: None,
        }
    }

    /// A bot reply, before any enrichment is attached.
    ///
    /// The id is caller-supplied so speech synthesis can be keyed to it
    /// before the message is assembled.
    pub fn bot(
        id: Uuid,
        bot_name: &str,
        body: String,
        reply_to: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            sender_id: SenderId::Bot,
            sender_name: bot_name.to_string(),
            body,
            timestamp: now,
            is_system: false,
            is_bot: true,
            mentions_bot: false,
            reply_to,
            audio: None,
            visemes: None,
            expression: None,
            animation: None,
        }
    }
}

/// Case-insensitive check for an `@<bot name>` mention anywhere in a
/// message body.
pub fn body_mentions_bot(body: &str, bot_name: &str) -> bool {
    let needle = format!("@{}", bot_name.to_lowercase());
    body.to_lowercase().contains(&needle)
}
