//! The bot reply pipeline: context gathering, reply generation, and
//! optional speech enrichment.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use log::{error, info, warn};
use uuid::Uuid;

use crate::bot::{Responder, SpeechSynthesizer};
use crate::core::message::{ChatMessage, SenderId};
use crate::core::server::ChatServer;

/// Drives one bot reply per accepted mention.
///
/// Responder failure drops the reply entirely; synthesizer failure
/// publishes the text-only reply. Neither ever touches the already
/// accepted triggering message.
pub struct ReplyPipeline {
    responder: Arc<dyn Responder>,
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    bot_name: String,
    default_expression: String,
    default_animation: String,
}

impl ReplyPipeline {
    pub fn new(responder: Arc<dyn Responder>, bot_name: String) -> Self {
        Self {
            responder,
            synthesizer: None,
            bot_name,
            default_expression: "smile".to_string(),
            default_animation: "Talking_1".to_string(),
        }
    }

    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    pub fn with_defaults(mut self, expression: String, animation: String) -> Self {
        self.default_expression = expression;
        self.default_animation = animation;
        self
    }

    /// Generate, enrich and publish the bot's reply to one accepted
    /// mention. The trigger has already been broadcast by the time this
    /// runs; nothing here can retract or reorder it.
    pub async fn handle_mention(&self, server: &ChatServer, trigger: ChatMessage) {
        let context = server.bot_context(Utc::now()).await;

        let text = match self.responder.reply(&context, &trigger).await {
            Ok(text) => text,
            Err(e) => {
                error!("Bot responder failed, dropping reply: {}", e);
                return;
            }
        };

        let message_id = Uuid::new_v4();
        let reply_to = match &trigger.sender_id {
            SenderId::User(user_id) => Some(user_id.clone()),
            _ => None,
        };

        let mut message =
            ChatMessage::bot(message_id, &self.bot_name, text, reply_to, Utc::now());
        message.expression = Some(self.default_expression.clone());
        message.animation = Some(self.default_animation.clone());

        if let Some(synthesizer) = &self.synthesizer {
            match synthesizer.synthesize(&message.body, message_id).await {
                Ok(clip) => {
                    message.audio = Some(BASE64.encode(&clip.audio));
                    message.visemes = Some(clip.visemes);
                }
                Err(e) => {
                    // Text-only reply still stands.
                    warn!("Speech synthesis failed for message {}: {}", message_id, e);
                }
            }
        }

        info!(
            "Publishing bot reply {} to mention by {}",
            message_id, trigger.sender_name
        );
        server.publish_bot_message(message, Utc::now()).await;
    }
}
