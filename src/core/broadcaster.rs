//! Fan-out of accepted events to live connections.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::warn;
use tokio::sync::mpsc;
use uuid::Uuid;
use warp::ws::Message as WsMessage;

use crate::core::events::ServerEvent;

/// One live WebSocket connection's outbound half plus liveness stamps.
pub struct Connection {
    pub id: Uuid,
    sender: mpsc::UnboundedSender<WsMessage>,
    pub connected_at: Instant,
    last_seen: Instant,
}

impl Connection {
    pub fn new(id: Uuid, sender: mpsc::UnboundedSender<WsMessage>) -> Self {
        let now = Instant::now();
        Self {
            id,
            sender,
            connected_at: now,
            last_seen: now,
        }
    }

    /// Queue an already-serialized frame. Failures mean the receiving
    /// task is gone; the caller decides whether that matters.
    fn send_text(&self, text: &str) -> bool {
        match self.sender.send(WsMessage::text(text)) {
            Ok(_) => true,
            Err(_) => {
                warn!("Failed to queue message for connection {}", self.id);
                false
            }
        }
    }

    /// Refresh the liveness stamp; any inbound frame counts.
    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// True once nothing has been heard from the peer for `timeout`.
    pub fn is_stale(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Owns the outbound half of every live connection and delivers events
/// to all of them, or to one of them for private errors.
///
/// Delivery is fire-and-forget: a connection whose receiving task has
/// already gone away is skipped, never blocking the rest. Callers that
/// publish under the coordinator's state lock get a single global order
/// across all connections for free.
#[derive(Default)]
pub struct Broadcaster {
    connections: HashMap<Uuid, Connection>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self {
            connections: HashMap::new(),
        }
    }

    /// Track a new connection's outbound channel.
    pub fn register(&mut self, id: Uuid, sender: mpsc::UnboundedSender<WsMessage>) {
        self.connections.insert(id, Connection::new(id, sender));
    }

    /// Stop tracking a connection. Returns whether it was present.
    pub fn unregister(&mut self, id: &Uuid) -> bool {
        self.connections.remove(id).is_some()
    }

    /// Deliver an event to every live connection, the originator
    /// included. Returns how many queues accepted it.
    pub fn publish(&self, event: &ServerEvent) -> usize {
        let text = match serde_json::to_string(event) {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to serialize event for broadcast: {}", e);
                return 0;
            }
        };

        self.connections
            .values()
            .filter(|connection| connection.send_text(&text))
            .count()
    }

    /// Deliver an event to one connection only. No other connection and
    /// no shared state observes it.
    pub fn notify(&self, id: &Uuid, event: &ServerEvent) -> bool {
        let text = match serde_json::to_string(event) {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to serialize event for connection {}: {}", id, e);
                return false;
            }
        };

        match self.connections.get(id) {
            Some(connection) => connection.send_text(&text),
            None => false,
        }
    }

    /// Refresh a connection's liveness stamp.
    pub fn touch(&mut self, id: &Uuid) {
        if let Some(connection) = self.connections.get_mut(id) {
            connection.touch();
        }
    }

    /// Connections that have been silent longer than `timeout`.
    pub fn stale_connections(&self, timeout: Duration) -> Vec<Uuid> {
        self.connections
            .values()
            .filter(|connection| connection.is_stale(timeout))
            .map(|connection| connection.id)
            .collect()
    }

    /// Number of live connections, identified or not.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attach(broadcaster: &mut Broadcaster) -> (Uuid, mpsc::UnboundedReceiver<WsMessage>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        broadcaster.register(id, tx);
        (id, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<WsMessage>) -> Vec<String> {
        let mut frames = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            frames.push(msg.to_str().unwrap().to_string());
        }
        frames
    }

    #[test]
    fn test_publish_reaches_every_connection_in_order() {
        let mut broadcaster = Broadcaster::new();
        let (_a, mut rx_a) = attach(&mut broadcaster);
        let (_b, mut rx_b) = attach(&mut broadcaster);

        broadcaster.publish(&ServerEvent::UserCount { count: 1 });
        broadcaster.publish(&ServerEvent::UserCount { count: 2 });

        let a = drain(&mut rx_a);
        let b = drain(&mut rx_b);
        assert_eq!(a.len(), 2);
        assert_eq!(a, b);
        assert!(a[0].contains("\"count\":1"));
        assert!(a[1].contains("\"count\":2"));
    }

    #[test]
    fn test_notify_targets_a_single_connection() {
        let mut broadcaster = Broadcaster::new();
        let (a, mut rx_a) = attach(&mut broadcaster);
        let (_b, mut rx_b) = attach(&mut broadcaster);

        assert!(broadcaster.notify(
            &a,
            &ServerEvent::ErrorMessage {
                message: "private".to_string(),
            },
        ));

        assert_eq!(drain(&mut rx_a).len(), 1);
        assert!(drain(&mut rx_b).is_empty());
        assert!(!broadcaster.notify(&Uuid::new_v4(), &ServerEvent::UserCount { count: 0 }));
    }

    #[test]
    fn test_dead_connection_does_not_block_the_rest() {
        let mut broadcaster = Broadcaster::new();
        let (_a, rx_a) = attach(&mut broadcaster);
        let (_b, mut rx_b) = attach(&mut broadcaster);

        // Simulate a peer whose receiving task is gone.
        drop(rx_a);

        let delivered = broadcaster.publish(&ServerEvent::UserCount { count: 2 });
        assert_eq!(delivered, 1);
        assert_eq!(drain(&mut rx_b).len(), 1);
    }

    #[test]
    fn test_unregister_stops_delivery() {
        let mut broadcaster = Broadcaster::new();
        let (a, mut rx_a) = attach(&mut broadcaster);

        assert!(broadcaster.unregister(&a));
        assert!(!broadcaster.unregister(&a));
        broadcaster.publish(&ServerEvent::UserCount { count: 0 });
        assert!(drain(&mut rx_a).is_empty());
        assert_eq!(broadcaster.connection_count(), 0);
    }
}
