//! The room coordinator: a single serialization point for all shared
//! chat state.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use tokio::sync::{mpsc, Mutex};
use tokio::time::interval;
use uuid::Uuid;
use warp::ws::Message as WsMessage;

use crate::config::RoomConfig;
use crate::constants::{BOT_CONTEXT_DEPTH, RESERVED_USERNAMES};
use crate::core::broadcaster::Broadcaster;
use crate::core::buffer::MessageBuffer;
use crate::core::events::ServerEvent;
use crate::core::message::{body_mentions_bot, ChatMessage};
use crate::core::rate_limiter::RateLimiter;
use crate::core::registry::SessionRegistry;
use crate::core::spam::AntiSpamFilter;

/// Everything the room owns. Confined behind one mutex so no operation
/// can observe another's intermediate state.
struct RoomState {
    registry: SessionRegistry,
    buffer: MessageBuffer,
    rate_limiter: RateLimiter,
    spam_filter: AntiSpamFilter,
    broadcaster: Broadcaster,
}

/// The authoritative in-memory coordinator for one chat room.
///
/// Inbound events mutate the shared state strictly one at a time; I/O
/// stays parallel because delivery only queues frames on per-connection
/// channels. Nothing in here awaits an external collaborator: bot
/// enrichment happens after acceptance, as a separate later message.
pub struct ChatServer {
    state: Mutex<RoomState>,
    config: RoomConfig,
}

/// Shared reference to the coordinator.
pub type SharedChatServer = Arc<ChatServer>;

impl ChatServer {
    pub fn new(config: RoomConfig) -> Self {
        let reserved = RESERVED_USERNAMES
            .iter()
            .map(|name| name.to_string())
            .chain(std::iter::once(config.bot_name.clone()));

        Self {
            state: Mutex::new(RoomState {
                registry: SessionRegistry::new(reserved),
                buffer: MessageBuffer::new(config.max_messages, config.message_ttl),
                rate_limiter: RateLimiter::new(
                    config.rate_limit_sends,
                    config.rate_limit_window,
                    config.mention_cooldown,
                ),
                spam_filter: AntiSpamFilter::new(config.max_body_chars),
                broadcaster: Broadcaster::new(),
            }),
            config,
        }
    }

    /// Display name of the resident bot.
    pub fn bot_name(&self) -> &str {
        &self.config.bot_name
    }

    /// Track a freshly upgraded socket and hand it its transport
    /// identity. No session exists until the name is negotiated.
    pub async fn connect(&self, connection_id: Uuid, sender: mpsc::UnboundedSender<WsMessage>) {
        let state = &mut *self.state.lock().await;
        state.broadcaster.register(connection_id, sender);
        state.broadcaster.notify(
            &connection_id,
            &ServerEvent::Connected {
                connection_id: connection_id.to_string(),
            },
        );
        info!(
            "Client connected: {} ({} connections)",
            connection_id,
            state.broadcaster.connection_count()
        );
    }

    /// Negotiate a display identity for a connection.
    ///
    /// Rejections go privately to the requester and leave every shared
    /// structure untouched. Success replies with the rolling history,
    /// then announces the arrival and the refreshed participant count
    /// to the whole room.
    pub async fn set_username(&self, connection_id: Uuid, requested: &str, now: DateTime<Utc>) {
        let state = &mut *self.state.lock().await;

        let session = match state.registry.negotiate(connection_id, requested, now) {
            Ok(session) => session,
            Err(e) => {
                debug!("Rejected username {:?} for {}: {}", requested, connection_id, e);
                state.broadcaster.notify(
                    &connection_id,
                    &ServerEvent::UsernameError {
                        message: e.to_string(),
                    },
                );
                return;
            }
        };

        let history = state.buffer.snapshot(now);
        state
            .broadcaster
            .notify(&connection_id, &ServerEvent::ChatHistory { messages: history });

        let join = ChatMessage::system(format!("{} joined the chat", session.username), now);
        state.buffer.append(join.clone(), now);
        state.broadcaster.publish(&ServerEvent::NewMessage(join));
        state.broadcaster.publish(&ServerEvent::UserCount {
            count: state.registry.count(),
        });

        info!(
            "Connection {} set username: {} ({} participants)",
            connection_id,
            session.username,
            state.registry.count()
        );
    }

    /// Run a candidate message through admission control and, if it
    /// passes, append and fan it out.
    ///
    /// Returns the accepted message so the caller can kick off bot
    /// enrichment after the state lock is released; rejections are
    /// reported privately to the sender and return `None`.
    pub async fn send_message(
        &self,
        connection_id: Uuid,
        body: &str,
        now: DateTime<Utc>,
    ) -> Option<ChatMessage> {
        let state = &mut *self.state.lock().await;

        let session = match state.registry.get(&connection_id) {
            Some(session) => session.clone(),
            None => {
                state.broadcaster.notify(
                    &connection_id,
                    &ServerEvent::ErrorMessage {
                        message: "Please set a username first".to_string(),
                    },
                );
                return None;
            }
        };

        if let Err(e) = state.rate_limiter.admit(&session.user_id, now) {
            debug!("Rate-limited {}: {}", session.username, e);
            state.broadcaster.notify(
                &connection_id,
                &ServerEvent::ErrorMessage {
                    message: e.to_string(),
                },
            );
            return None;
        }

        if let Err(e) = state.spam_filter.classify(body) {
            debug!("Flagged message from {}: {}", session.username, e);
            state.broadcaster.notify(
                &connection_id,
                &ServerEvent::ErrorMessage {
                    message: e.to_string(),
                },
            );
            return None;
        }

        let mentions_bot = body_mentions_bot(body, &self.config.bot_name);
        let message = ChatMessage::user(&session, body.to_string(), mentions_bot, now);

        state.buffer.append(message.clone(), now);
        let delivered = state.broadcaster.publish(&ServerEvent::NewMessage(message.clone()));
        debug!(
            "Broadcast message {} from {} to {} connections",
            message.id, session.username, delivered
        );

        Some(message)
    }

    /// Observe a transport-level disconnect. If the connection held a
    /// session, the departure is announced and the participant count
    /// refreshed; an unidentified connection vanishes silently.
    pub async fn disconnect(&self, connection_id: Uuid, now: DateTime<Utc>) {
        let state = &mut *self.state.lock().await;

        let was_tracked = state.broadcaster.unregister(&connection_id);
        let session = state.registry.remove(&connection_id);

        if let Some(session) = session {
            state.rate_limiter.forget(&session.user_id);

            let leave = ChatMessage::system(format!("{} left the chat", session.username), now);
            state.buffer.append(leave.clone(), now);
            state.broadcaster.publish(&ServerEvent::NewMessage(leave));
            state.broadcaster.publish(&ServerEvent::UserCount {
                count: state.registry.count(),
            });

            info!(
                "Client disconnected: {} ({}) ({} participants)",
                connection_id,
                session.username,
                state.registry.count()
            );
        } else if was_tracked {
            info!("Client disconnected: {} (never identified)", connection_id);
        }
    }

    /// Append and fan out a collaborator-built message. Used by the
    /// reply pipeline once enrichment has finished (or been skipped).
    pub async fn publish_bot_message(&self, message: ChatMessage, now: DateTime<Utc>) {
        let state = &mut *self.state.lock().await;
        state.buffer.append(message.clone(), now);
        let delivered = state.broadcaster.publish(&ServerEvent::NewMessage(message));
        debug!("Broadcast bot message to {} connections", delivered);
    }

    /// Deliver an event to one connection only.
    pub async fn notify(&self, connection_id: Uuid, event: &ServerEvent) -> bool {
        self.state.lock().await.broadcaster.notify(&connection_id, event)
    }

    /// Refresh a connection's liveness stamp; any inbound frame counts.
    pub async fn touch(&self, connection_id: Uuid) {
        self.state.lock().await.broadcaster.touch(&connection_id);
    }

    /// Number of identified participants.
    pub async fn participant_count(&self) -> usize {
        self.state.lock().await.registry.count()
    }

    /// Number of live connections, identified or not.
    pub async fn connection_count(&self) -> usize {
        self.state.lock().await.broadcaster.connection_count()
    }

    /// The rolling history as of `now`.
    pub async fn history_snapshot(&self, now: DateTime<Utc>) -> Vec<ChatMessage> {
        self.state.lock().await.buffer.snapshot(now)
    }

    /// Context window for the reply collaborator.
    pub async fn bot_context(&self, now: DateTime<Utc>) -> Vec<ChatMessage> {
        self.state
            .lock()
            .await
            .buffer
            .context_for_bot(now, BOT_CONTEXT_DEPTH)
    }

    /// Periodically disconnect connections that have gone silent.
    ///
    /// Departures produced here run the ordinary disconnect path and are
    /// indistinguishable from transport-observed ones. The stale set is
    /// collected under the lock, but the lock is released before any
    /// disconnect runs.
    pub fn start_sweep_task(self: Arc<Self>, sweep_interval: Duration, timeout: Duration) {
        let server = Arc::clone(&self);
        tokio::spawn(async move {
            let mut ticker = interval(sweep_interval);
            loop {
                ticker.tick().await;
                server.sweep_stale(timeout).await;
            }
        });
    }

    /// One sweep pass: disconnect every connection silent for longer
    /// than `timeout`.
    pub async fn sweep_stale(&self, timeout: Duration) {
        let stale = {
            let state = self.state.lock().await;
            state.broadcaster.stale_connections(timeout)
        };

        if stale.is_empty() {
            return;
        }

        warn!("Sweeping {} stale connections", stale.len());
        for connection_id in stale {
            self.disconnect(connection_id, Utc::now()).await;
        }
    }
}
