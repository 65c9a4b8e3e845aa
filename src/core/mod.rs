//! Core coordination logic for the chat room

pub mod broadcaster;
pub mod buffer;
pub mod events;
pub mod message;
pub mod rate_limiter;
pub mod registry;
pub mod server;
pub mod spam;

// Re-export main components for convenience
pub use broadcaster::Broadcaster;
pub use buffer::MessageBuffer;
pub use events::{ClientEvent, ServerEvent};
pub use message::{ChatMessage, MouthCue, SenderId, VisemeTrack};
pub use rate_limiter::{RateLimitError, RateLimiter};
pub use registry::{IdentityError, Session, SessionRegistry};
pub use server::{ChatServer, SharedChatServer};
pub use spam::{AntiSpamFilter, SpamError};
