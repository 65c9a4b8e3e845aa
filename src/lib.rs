//! Parlor - a single-room real-time chat coordinator
//!
//! This library provides a WebSocket chat server with identity
//! negotiation, rolling history, admission control, and an optional
//! bot reply pipeline, plus a reconnecting client for talking to it.

pub mod bot;
pub mod client;
pub mod config;
pub mod constants;
pub mod core;
pub mod error;
pub mod handlers;

// Re-export main components
pub use config::*;
pub use constants::*;
