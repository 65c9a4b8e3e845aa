//! Collaborator seam for the resident bot.
//!
//! The coordinator never blocks on these: replies are generated and
//! enriched strictly after the triggering message has been accepted
//! and broadcast, and every failure stays isolated to the bot's own
//! (never-sent or unenriched) message.

pub mod pipeline;

pub use pipeline::ReplyPipeline;

use async_trait::async_trait;
use uuid::Uuid;

use crate::core::message::{ChatMessage, VisemeTrack};
use crate::error::Result;

/// Produces the bot's reply text from recent room context plus the
/// message that mentioned it.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn reply(&self, context: &[ChatMessage], trigger: &ChatMessage) -> Result<String>;
}

/// Encoded audio plus its timed mouth cues for one reply.
pub struct SpeechClip {
    pub audio: Vec<u8>,
    pub visemes: VisemeTrack,
}

/// Turns reply text into audio and a viseme track, keyed to the reply
/// message's id.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, message_id: Uuid) -> Result<SpeechClip>;
}
