// Fundamental configuration constants
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3002;
pub const WS_PATH: &str = "ws";

// Rolling history limits
pub const DEFAULT_MAX_MESSAGES: usize = 50;
pub const DEFAULT_MESSAGE_TTL_SECS: u64 = 120;

// Per-sender admission control
pub const DEFAULT_RATE_LIMIT_SENDS: usize = 3;
pub const DEFAULT_RATE_LIMIT_WINDOW_MS: u64 = 10_000;
pub const DEFAULT_MENTION_COOLDOWN_MS: u64 = 30_000;

// Message content limits
pub const DEFAULT_MAX_BODY_CHARS: usize = 500;
pub const CAPS_RATIO_LIMIT: f32 = 0.7;
pub const CAPS_MIN_CHARS: usize = 10;
pub const MAX_CHAR_RUN: usize = 10;

// Username policy
pub const MIN_USERNAME_CHARS: usize = 2;
pub const MAX_USERNAME_CHARS: usize = 20;
pub const RESERVED_USERNAMES: &[&str] = &["system", "admin", "moderator"];

// Resident bot defaults
pub const DEFAULT_BOT_NAME: &str = "Nova";
pub const BOT_CONTEXT_DEPTH: usize = 5;

// Transport limits
pub const MAX_FRAME_BYTES: usize = 4096;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 300;

// Client reconnection defaults
pub const DEFAULT_RECONNECT_BASE_MS: u64 = 1_000;
pub const DEFAULT_RECONNECT_CAP_MS: u64 = 30_000;
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 10;
pub const DIAL_TIMEOUT_SECS: u64 = 10;
