use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum ParlorError {
    // Connection errors
    ConnectionError(String),
    ConnectionClosed,

    // Message errors
    MessageParseError(String),
    MessageTooLarge(usize),

    // Client errors
    InvalidEndpoint(String),
    NotConnected,

    // Collaborator errors (bot responder / speech synthesizer)
    CollaboratorError(String),

    // Configuration errors
    ConfigError(String),
}

impl fmt::Display for ParlorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionError(msg) => write!(f, "Connection error: {}", msg),
            Self::ConnectionClosed => write!(f, "Connection closed unexpectedly"),
            Self::MessageParseError(msg) => write!(f, "Message parse error: {}", msg),
            Self::MessageTooLarge(size) => write!(f, "Message too large: {} bytes", size),
            Self::InvalidEndpoint(msg) => write!(f, "Invalid endpoint: {}", msg),
            Self::NotConnected => write!(f, "Not connected to chat server"),
            Self::CollaboratorError(msg) => write!(f, "Collaborator error: {}", msg),
            Self::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl Error for ParlorError {}

// Generic result type for parlor
pub type Result<T> = std::result::Result<T, ParlorError>;
