//! Chat client: a thin command handle in front of a driver task.
//!
//! The handle pushes commands onto the driver's event queue and exposes
//! a notification stream. The driver owns the lifecycle machine, the
//! retry timer, and at most one live transport, and processes every
//! input (commands, dial outcomes, transport frames, timer fires) from
//! a single queue, so no locking is needed anywhere in the client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use url::Url;

use crate::client::lifecycle::{
    BackoffConfig, ConnectionLifecycle, ConnectionStatus, LifecycleAction,
};
use crate::client::retry::{RetryTimer, RetryToken};
use crate::constants::DIAL_TIMEOUT_SECS;
use crate::core::events::{ClientEvent, ServerEvent};
use crate::core::message::ChatMessage;
use crate::core::registry::validate_username;
use crate::error::{ParlorError, Result};

/// Client configuration. Construction validates the endpoint so a bad
/// URL fails fast instead of on the first dial.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: String,
    pub backoff: BackoffConfig,
    pub dial_timeout: Duration,
}

impl ClientConfig {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let endpoint = endpoint.into();
        let url = Url::parse(&endpoint)
            .map_err(|e| ParlorError::InvalidEndpoint(format!("{}: {}", endpoint, e)))?;
        match url.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(ParlorError::InvalidEndpoint(format!(
                    "unsupported scheme '{}', expected ws or wss",
                    other
                )))
            }
        }
        if url.host_str().is_none() {
            return Err(ParlorError::InvalidEndpoint(format!(
                "{}: missing host",
                endpoint
            )));
        }
        Ok(Self {
            endpoint,
            backoff: BackoffConfig::default(),
            dial_timeout: Duration::from_secs(DIAL_TIMEOUT_SECS),
        })
    }

    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }
}

/// What a live transport reports back to the driver.
#[derive(Debug)]
pub enum TransportEvent {
    /// A complete text frame from the server.
    Frame(String),
    /// The transport ended, normally or not. Sent at most once.
    Closed,
}

/// A connected transport: an outbound text-frame sink and an inbound
/// event stream. Dropping the outbound half tears the connection down.
pub struct Transport {
    pub outbound: UnboundedSender<String>,
    pub inbound: UnboundedReceiver<TransportEvent>,
}

/// Dials one connection attempt. Production uses [`WsConnector`];
/// tests inject scripted implementations.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, endpoint: &str) -> Result<Transport>;
}

/// WebSocket connector backed by tokio-tungstenite. Spawns one pump
/// task per direction; the read pump reports `Closed` exactly once.
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, endpoint: &str) -> Result<Transport> {
        let (stream, _) = connect_async(endpoint)
            .await
            .map_err(|e| ParlorError::ConnectionError(e.to_string()))?;
        let (mut sink, mut source) = stream.split();

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(text) = outbound_rx.recv().await {
                if sink.send(WsMessage::Text(text)).await.is_err() {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        tokio::spawn(async move {
            while let Some(frame) = source.next().await {
                match frame {
                    Ok(WsMessage::Text(text)) => {
                        if inbound_tx.send(TransportEvent::Frame(text)).is_err() {
                            return;
                        }
                    }
                    Ok(WsMessage::Close(_)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
            let _ = inbound_tx.send(TransportEvent::Closed);
        });

        Ok(Transport {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}

/// What the driver reports to the application.
#[derive(Debug, Clone)]
pub enum ClientNotification {
    /// The lifecycle moved; carries the retry count for display.
    Status {
        status: ConnectionStatus,
        attempts: u32,
    },
    /// Rolling history received after successful identification.
    History(Vec<ChatMessage>),
    /// A message fanned out to the room, bot replies included.
    Message(ChatMessage),
    /// Refreshed count of identified participants.
    UserCount(usize),
    /// A user-facing error, local or from the server.
    Error(String),
}

enum ClientCommand {
    SetIdentity(String),
    SendChat(String),
    Reconnect,
    ClearIdentity,
    Shutdown,
}

enum DriverEvent {
    Command(ClientCommand),
    DialOutcome {
        generation: u64,
        result: Result<Transport>,
    },
    FromTransport {
        generation: u64,
        event: TransportEvent,
    },
    RetryFired(RetryToken),
}

/// Handle to a running chat client.
///
/// Commands are fire-and-forget; outcomes, including local validation
/// failures, arrive on the notification channel returned alongside the
/// handle.
pub struct ChatClient {
    events: UnboundedSender<DriverEvent>,
    driver: JoinHandle<()>,
}

impl ChatClient {
    /// Spawns a driver dialing with the production WebSocket connector.
    /// No connection is attempted until the first `set_username`.
    pub fn new(config: ClientConfig) -> (Self, UnboundedReceiver<ClientNotification>) {
        Self::with_connector(config, Arc::new(WsConnector))
    }

    pub fn with_connector(
        config: ClientConfig,
        connector: Arc<dyn Connector>,
    ) -> (Self, UnboundedReceiver<ClientNotification>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let driver = Driver::new(config, connector, events_tx.clone(), notify_tx);
        let handle = tokio::spawn(driver.run(events_rx));
        (
            Self {
                events: events_tx,
                driver: handle,
            },
            notify_rx,
        )
    }

    /// Claims an identity. Establishes connect intent: the first
    /// accepted name triggers the initial dial, and the name is
    /// re-sent on every successful (re)connect.
    pub fn set_username(&self, username: impl Into<String>) {
        self.command(ClientCommand::SetIdentity(username.into()));
    }

    /// Submits a message body. Surfaces a local error notification
    /// when not connected; never triggers a dial.
    pub fn send_message(&self, body: impl Into<String>) {
        self.command(ClientCommand::SendChat(body.into()));
    }

    /// Manual escape from `Failed`: resets the attempt budget and
    /// dials immediately.
    pub fn reconnect(&self) {
        self.command(ClientCommand::Reconnect);
    }

    /// Revokes connect intent: drops the connection, disarms any
    /// pending retry, and returns to `Disconnected`.
    pub fn clear_identity(&self) {
        self.command(ClientCommand::ClearIdentity);
    }

    /// Stops the driver and waits for it to finish.
    pub async fn shutdown(mut self) {
        let _ = self
            .events
            .send(DriverEvent::Command(ClientCommand::Shutdown));
        let _ = (&mut self.driver).await;
    }

    fn command(&self, command: ClientCommand) {
        let _ = self.events.send(DriverEvent::Command(command));
    }
}

impl Drop for ChatClient {
    fn drop(&mut self) {
        // The driver holds a clone of the event sender, so the channel
        // never closes on its own.
        let _ = self
            .events
            .send(DriverEvent::Command(ClientCommand::Shutdown));
    }
}

struct Driver {
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    events: UnboundedSender<DriverEvent>,
    notifications: UnboundedSender<ClientNotification>,
    lifecycle: ConnectionLifecycle,
    retry: RetryTimer<DriverEvent>,
    username: Option<String>,
    outbound: Option<UnboundedSender<String>>,
    forwarder: Option<JoinHandle<()>>,
    // Bumped on every dial and teardown; events stamped with an older
    // generation belong to a connection that no longer matters.
    generation: u64,
    last_status: Option<(ConnectionStatus, u32)>,
}

impl Driver {
    fn new(
        config: ClientConfig,
        connector: Arc<dyn Connector>,
        events: UnboundedSender<DriverEvent>,
        notifications: UnboundedSender<ClientNotification>,
    ) -> Self {
        let lifecycle = ConnectionLifecycle::new(config.backoff.clone());
        Self {
            config,
            connector,
            events,
            notifications,
            lifecycle,
            retry: RetryTimer::new(DriverEvent::RetryFired),
            username: None,
            outbound: None,
            forwarder: None,
            generation: 0,
            last_status: None,
        }
    }

    async fn run(mut self, mut events: UnboundedReceiver<DriverEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                DriverEvent::Command(command) => {
                    if !self.on_command(command) {
                        break;
                    }
                }
                DriverEvent::DialOutcome { generation, result } => {
                    self.on_dial_outcome(generation, result)
                }
                DriverEvent::FromTransport { generation, event } => {
                    self.on_transport_event(generation, event)
                }
                DriverEvent::RetryFired(token) => self.on_retry_fired(token),
            }
        }
        self.teardown();
    }

    /// Returns false when the driver should stop.
    fn on_command(&mut self, command: ClientCommand) -> bool {
        match command {
            ClientCommand::SetIdentity(requested) => {
                let username = match validate_username(&requested) {
                    Ok(username) => username,
                    Err(e) => {
                        self.notify_error(e.to_string());
                        return true;
                    }
                };
                self.username = Some(username.clone());

                if self.outbound.is_some()
                    && self.lifecycle.status() == ConnectionStatus::Connected
                {
                    // Already connected: renegotiate in place.
                    self.send_frame(&ClientEvent::SetUsername { username });
                } else {
                    let action = self.lifecycle.connect_intent();
                    self.perform(action);
                    self.notify_status();
                }
            }
            ClientCommand::SendChat(body) => {
                let body = body.trim();
                if body.is_empty() {
                    return true;
                }
                if self.lifecycle.status() != ConnectionStatus::Connected
                    || self.outbound.is_none()
                    || self.username.is_none()
                {
                    self.notify_error(ParlorError::NotConnected.to_string());
                    return true;
                }
                self.send_frame(&ClientEvent::SendMessage {
                    message: body.to_string(),
                });
            }
            ClientCommand::Reconnect => {
                if self.username.is_none() {
                    debug!("Reconnect requested without an identity; ignoring");
                    return true;
                }
                let action = self.lifecycle.manual_reconnect();
                self.perform(action);
                self.notify_status();
            }
            ClientCommand::ClearIdentity => {
                self.username = None;
                self.teardown();
                let action = self.lifecycle.revoke_intent();
                self.perform(action);
                self.notify_status();
            }
            ClientCommand::Shutdown => return false,
        }
        true
    }

    fn on_dial_outcome(&mut self, generation: u64, result: Result<Transport>) {
        if generation != self.generation {
            debug!("Ignoring dial outcome from a superseded attempt");
            return;
        }
        match result {
            Ok(transport) => {
                if self.lifecycle.status() != ConnectionStatus::Connecting {
                    return;
                }
                self.install_transport(transport);
                self.lifecycle.connection_established();
                info!("Connected to chat server at {}", self.config.endpoint);
                self.notify_status();

                if let Some(username) = self.username.clone() {
                    self.send_frame(&ClientEvent::SetUsername { username });
                }
            }
            Err(e) => {
                warn!("Connection attempt failed: {}", e);
                let action = self.lifecycle.dial_failed(e.to_string());
                self.perform(action);
                self.notify_status();
            }
        }
    }

    fn on_transport_event(&mut self, generation: u64, event: TransportEvent) {
        if generation != self.generation || self.outbound.is_none() {
            return;
        }
        match event {
            TransportEvent::Frame(text) => self.on_frame(&text),
            TransportEvent::Closed => {
                warn!("Connection to chat server lost");
                self.teardown();
                let action = self.lifecycle.connection_lost("connection closed".to_string());
                self.perform(action);
                self.notify_status();
            }
        }
    }

    fn on_retry_fired(&mut self, token: RetryToken) {
        if !self.retry.accepts(token) {
            debug!("Ignoring a cancelled retry");
            return;
        }
        self.retry.disarm();
        let action = self.lifecycle.retry_due();
        self.perform(action);
        self.notify_status();
    }

    fn on_frame(&mut self, text: &str) {
        let event = match serde_json::from_str::<ServerEvent>(text) {
            Ok(event) => event,
            Err(e) => {
                debug!("Discarding unrecognized server frame: {}", e);
                return;
            }
        };
        match event {
            ServerEvent::Connected { connection_id } => {
                debug!("Server assigned connection id {}", connection_id);
            }
            ServerEvent::UsernameError { message } => {
                // The server refused the name: surface the error and
                // revoke intent so the retry loop does not keep
                // re-submitting a rejected identity.
                warn!("Username rejected: {}", message);
                self.notify_error(message);
                self.username = None;
                self.teardown();
                let action = self.lifecycle.revoke_intent();
                self.perform(action);
                self.notify_status();
            }
            ServerEvent::ChatHistory { messages } => {
                self.notify(ClientNotification::History(messages));
            }
            ServerEvent::NewMessage(message) => {
                self.notify(ClientNotification::Message(message));
            }
            ServerEvent::ErrorMessage { message } => {
                self.notify_error(message);
            }
            ServerEvent::UserCount { count } => {
                self.notify(ClientNotification::UserCount(count));
            }
        }
    }

    fn perform(&mut self, action: LifecycleAction) {
        match action {
            LifecycleAction::Dial => {
                self.retry.cancel();
                self.dial();
            }
            LifecycleAction::ScheduleRetry { delay, attempt } => {
                let secs = (delay.as_millis() as u64 + 999) / 1_000;
                self.notify_error(format!(
                    "Reconnecting in {}s... ({}/{})",
                    secs, attempt, self.config.backoff.max_attempts
                ));
                self.retry.schedule(delay, self.events.clone());
            }
            LifecycleAction::CancelRetry => self.retry.cancel(),
            LifecycleAction::GiveUp => {
                self.retry.cancel();
                error!(
                    "Giving up after {} reconnect attempts",
                    self.config.backoff.max_attempts
                );
                self.notify_error("Connection lost. Please reconnect manually.".to_string());
            }
            LifecycleAction::None => {}
        }
    }

    fn dial(&mut self) {
        self.teardown();
        let generation = self.generation;
        let connector = Arc::clone(&self.connector);
        let endpoint = self.config.endpoint.clone();
        let dial_timeout = self.config.dial_timeout;
        let events = self.events.clone();

        info!(
            "Connecting to {} (attempt {})",
            endpoint,
            self.lifecycle.attempts() + 1
        );
        tokio::spawn(async move {
            let result = match tokio::time::timeout(dial_timeout, connector.connect(&endpoint))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(ParlorError::ConnectionError(format!(
                    "timed out after {}s",
                    dial_timeout.as_secs()
                ))),
            };
            let _ = events.send(DriverEvent::DialOutcome { generation, result });
        });
    }

    fn install_transport(&mut self, transport: Transport) {
        let Transport {
            outbound,
            mut inbound,
        } = transport;
        self.outbound = Some(outbound);

        let generation = self.generation;
        let events = self.events.clone();
        self.forwarder = Some(tokio::spawn(async move {
            while let Some(event) = inbound.recv().await {
                if events
                    .send(DriverEvent::FromTransport { generation, event })
                    .is_err()
                {
                    return;
                }
            }
        }));
    }

    /// Drops the live transport (if any) and invalidates every event
    /// still in flight for it.
    fn teardown(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.outbound = None;
        if let Some(task) = self.forwarder.take() {
            task.abort();
        }
    }

    fn send_frame(&mut self, event: &ClientEvent) {
        let Some(outbound) = &self.outbound else {
            return;
        };
        match serde_json::to_string(event) {
            Ok(text) => {
                if outbound.send(text).is_err() {
                    debug!("Transport dropped while sending");
                }
            }
            Err(e) => error!("Failed to encode client event: {}", e),
        }
    }

    fn notify(&self, notification: ClientNotification) {
        let _ = self.notifications.send(notification);
    }

    fn notify_error(&self, message: impl Into<String>) {
        self.notify(ClientNotification::Error(message.into()));
    }

    fn notify_status(&mut self) {
        let current = (self.lifecycle.status(), self.lifecycle.attempts());
        if self.last_status == Some(current) {
            return;
        }
        self.last_status = Some(current);
        self.notify(ClientNotification::Status {
            status: current.0,
            attempts: current.1,
        });
    }
}
