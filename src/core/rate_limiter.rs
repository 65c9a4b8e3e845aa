//! Per-sender sliding-window admission control.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Why a send was refused admission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitError {
    TooFast,
    MentionCooldown,
}

impl fmt::Display for RateLimitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooFast => write!(f, "Too many messages. Please slow down."),
            Self::MentionCooldown => write!(f, "Please wait before mentioning the bot again."),
        }
    }
}

impl Error for RateLimitError {}

/// Recent activity for one sender. Send instants older than the window
/// are evicted lazily on each check, never by a timer.
#[derive(Debug, Default)]
struct SenderHistory {
    sends: Vec<DateTime<Utc>>,
    last_mention: Option<DateTime<Utc>>,
}

/// Admits at most `max_sends` sends per sender within the trailing
/// `window`, plus a separate per-sender cooldown on the distinguished
/// mention action. A refused attempt is never recorded, so it cannot
/// extend the sender's own lockout.
pub struct RateLimiter {
    senders: HashMap<String, SenderHistory>,
    max_sends: usize,
    window: chrono::Duration,
    mention_cooldown: chrono::Duration,
}

impl RateLimiter {
    pub fn new(max_sends: usize, window: Duration, mention_cooldown: Duration) -> Self {
        Self {
            senders: HashMap::new(),
            max_sends,
            window: chrono::Duration::from_std(window)
                .unwrap_or_else(|_| chrono::Duration::milliseconds(i64::MAX / 1_000)),
            mention_cooldown: chrono::Duration::from_std(mention_cooldown)
                .unwrap_or_else(|_| chrono::Duration::milliseconds(i64::MAX / 1_000)),
        }
    }

    /// Admit or refuse a send at instant `now`.
    pub fn admit(&mut self, sender_id: &str, now: DateTime<Utc>) -> Result<(), RateLimitError> {
        let history = self.senders.entry(sender_id.to_string()).or_default();
        history.sends.retain(|&sent| now - sent < self.window);

        if history.sends.len() >= self.max_sends {
            return Err(RateLimitError::TooFast);
        }

        history.sends.push(now);
        Ok(())
    }

    /// Admit or refuse a bot mention at instant `now`, independent of the
    /// general send limit. Gate is available but the ingestion path does
    /// not currently call it; mentions ride on the ordinary send limit.
    pub fn admit_mention(
        &mut self,
        sender_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), RateLimitError> {
        let history = self.senders.entry(sender_id.to_string()).or_default();

        if let Some(last) = history.last_mention {
            if now - last < self.mention_cooldown {
                return Err(RateLimitError::MentionCooldown);
            }
        }

        history.last_mention = Some(now);
        Ok(())
    }

    /// Drop a sender's history once the owning session is gone, so the
    /// map cannot grow without bound across many short-lived identities.
    pub fn forget(&mut self, sender_id: &str) {
        self.senders.remove(sender_id);
    }

    /// Number of senders currently tracked.
    pub fn tracked_senders(&self) -> usize {
        self.senders.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    fn limiter() -> RateLimiter {
        RateLimiter::new(
            3,
            Duration::from_millis(10_000),
            Duration::from_millis(30_000),
        )
    }

    #[test]
    fn test_fourth_send_within_window_is_refused() {
        let mut limiter = limiter();
        assert!(limiter.admit("u1", at(0)).is_ok());
        assert!(limiter.admit("u1", at(2_000)).is_ok());
        assert!(limiter.admit("u1", at(4_000)).is_ok());
        assert_eq!(limiter.admit("u1", at(5_000)), Err(RateLimitError::TooFast));
    }

    #[test]
    fn test_admission_resumes_once_window_elapses() {
        let mut limiter = limiter();
        for ms in [0, 1_000, 2_000] {
            limiter.admit("u1", at(ms)).unwrap();
        }
        assert_eq!(limiter.admit("u1", at(5_000)), Err(RateLimitError::TooFast));

        // 10s after the first send, one slot is free again.
        assert!(limiter.admit("u1", at(10_000)).is_ok());
        // All three original sends aged out; two more fit.
        assert!(limiter.admit("u1", at(12_001)).is_ok());
        assert!(limiter.admit("u1", at(12_002)).is_ok());
        assert_eq!(
            limiter.admit("u1", at(12_003)),
            Err(RateLimitError::TooFast)
        );
    }

    #[test]
    fn test_refused_attempt_is_not_recorded() {
        let mut limiter = limiter();
        for ms in [0, 100, 200] {
            limiter.admit("u1", at(ms)).unwrap();
        }
        // Hammering while locked out must not extend the lockout.
        for ms in [300, 2_000, 6_000, 9_999] {
            assert!(limiter.admit("u1", at(ms)).is_err());
        }
        // Window measured from the accepted sends only.
        assert!(limiter.admit("u1", at(10_000)).is_ok());
    }

    #[test]
    fn test_senders_are_limited_independently() {
        let mut limiter = limiter();
        for ms in [0, 1, 2] {
            limiter.admit("u1", at(ms)).unwrap();
        }
        assert!(limiter.admit("u1", at(3)).is_err());
        assert!(limiter.admit("u2", at(3)).is_ok());
    }

    #[test]
    fn test_mention_cooldown_is_independent_of_send_limit() {
        let mut limiter = limiter();
        assert!(limiter.admit_mention("u1", at(0)).is_ok());
        assert_eq!(
            limiter.admit_mention("u1", at(29_999)),
            Err(RateLimitError::MentionCooldown)
        );
        assert!(limiter.admit_mention("u1", at(30_000)).is_ok());

        // The mention gate holds no slots in the send window.
        assert!(limiter.admit("u1", at(30_001)).is_ok());
        assert!(limiter.admit("u1", at(30_002)).is_ok());
        assert!(limiter.admit("u1", at(30_003)).is_ok());
        assert!(limiter.admit("u1", at(30_004)).is_err());
    }

    #[test]
    fn test_forget_drops_tracked_history() {
        let mut limiter = limiter();
        limiter.admit("u1", at(0)).unwrap();
        limiter.admit("u2", at(0)).unwrap();
        assert_eq!(limiter.tracked_senders(), 2);

        limiter.forget("u1");
        assert_eq!(limiter.tracked_senders(), 1);

        // A forgotten sender starts from a clean window.
        for ms in [1, 2, 3] {
            assert!(limiter.admit("u1", at(ms)).is_ok());
        }
    }
}
