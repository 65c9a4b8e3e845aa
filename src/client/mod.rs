//! Client-side connection management: lifecycle state machine, retry
//! scheduling, and the WebSocket chat client built on them.

pub mod chat;
pub mod lifecycle;
pub mod retry;

pub use chat::{
    ChatClient, ClientConfig, ClientNotification, Connector, Transport, TransportEvent,
    WsConnector,
};
pub use lifecycle::{BackoffConfig, ConnectionLifecycle, ConnectionStatus, LifecycleAction};
pub use retry::{RetryTimer, RetryToken};
