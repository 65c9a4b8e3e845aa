//! Connection lifecycle state machine for the chat client.
//!
//! Pure bookkeeping: the machine decides *what* should happen next
//! (dial, arm a retry timer, give up) and the driver performs it. No
//! timers or sockets live here, which keeps every transition directly
//! testable.

use std::time::Duration;

use crate::constants::{
    DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_BASE_MS, DEFAULT_RECONNECT_CAP_MS,
};

/// Where the client currently stands with respect to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    /// Retry budget exhausted. Terminal until an explicit manual
    /// reconnect.
    Failed,
}

/// Retry schedule parameters.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    pub base: Duration,
    pub cap: Duration,
    pub max_attempts: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(DEFAULT_RECONNECT_BASE_MS),
            cap: Duration::from_millis(DEFAULT_RECONNECT_CAP_MS),
            max_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
        }
    }
}

/// Instruction the machine hands back to its driver after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleAction {
    /// Begin a connection attempt now.
    Dial,
    /// Arm the retry timer; `attempt` is 1-indexed for reporting.
    ScheduleRetry { delay: Duration, attempt: u32 },
    /// Disarm any pending retry timer.
    CancelRetry,
    /// Retry budget exhausted; stop trying until told otherwise.
    GiveUp,
    /// Nothing for the driver to do.
    None,
}

/// The client-side connection state machine.
///
/// Attempt count only moves while connecting or reconnecting, resets on
/// a successful connect, a manual reconnect, or revocation of intent,
/// and caps at `max_attempts` scheduled retries before the terminal
/// `Failed` state.
pub struct ConnectionLifecycle {
    status: ConnectionStatus,
    attempts: u32,
    last_error: Option<String>,
    backoff: BackoffConfig,
}

impl ConnectionLifecycle {
    pub fn new(backoff: BackoffConfig) -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            attempts: 0,
            last_error: None,
            backoff,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Retries scheduled since the last successful connect or reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Backoff delay for the k-th retry (1-indexed): the base doubled
    /// per attempt, capped.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.backoff.base.saturating_mul(factor).min(self.backoff.cap)
    }

    /// The user wants to be connected. Starts a fresh attempt cycle
    /// unless one is already underway.
    pub fn connect_intent(&mut self) -> LifecycleAction {
        match self.status {
            ConnectionStatus::Disconnected | ConnectionStatus::Failed => self.begin(),
            _ => LifecycleAction::None,
        }
    }

    /// Explicit escape hatch: clears the attempt budget and error state
    /// and dials again, from any state except an already-live one.
    pub fn manual_reconnect(&mut self) -> LifecycleAction {
        if self.status == ConnectionStatus::Connected {
            return LifecycleAction::None;
        }
        self.begin()
    }

    /// The user no longer wants to be connected. Never passes through
    /// `Failed`; any pending retry must be disarmed.
    pub fn revoke_intent(&mut self) -> LifecycleAction {
        self.status = ConnectionStatus::Disconnected;
        self.attempts = 0;
        self.last_error = None;
        LifecycleAction::CancelRetry
    }

    /// A dial completed successfully.
    pub fn connection_established(&mut self) -> LifecycleAction {
        if self.status != ConnectionStatus::Connecting {
            return LifecycleAction::None;
        }
        self.status = ConnectionStatus::Connected;
        self.attempts = 0;
        self.last_error = None;
        LifecycleAction::None
    }

    /// A dial failed before the connection was established.
    pub fn dial_failed(&mut self, reason: String) -> LifecycleAction {
        if self.status != ConnectionStatus::Connecting {
            return LifecycleAction::None;
        }
        self.schedule_retry(reason)
    }

    /// An established connection dropped without the user asking.
    pub fn connection_lost(&mut self, reason: String) -> LifecycleAction {
        if self.status != ConnectionStatus::Connected {
            return LifecycleAction::None;
        }
        self.schedule_retry(reason)
    }

    /// The armed retry timer fired.
    pub fn retry_due(&mut self) -> LifecycleAction {
        if self.status != ConnectionStatus::Reconnecting {
            return LifecycleAction::None;
        }
        self.status = ConnectionStatus::Connecting;
        LifecycleAction::Dial
    }

    fn begin(&mut self) -> LifecycleAction {
        self.status = ConnectionStatus::Connecting;
        self.attempts = 0;
        self.last_error = None;
        LifecycleAction::Dial
    }

    fn schedule_retry(&mut self, reason: String) -> LifecycleAction {
        self.last_error = Some(reason);

        if self.attempts >= self.backoff.max_attempts {
            self.status = ConnectionStatus::Failed;
            return LifecycleAction::GiveUp;
        }

        self.status = ConnectionStatus::Reconnecting;
        self.attempts += 1;
        LifecycleAction::ScheduleRetry {
            delay: self.backoff_delay(self.attempts),
            attempt: self.attempts,
        }
    }
}

impl Default for ConnectionLifecycle {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> ConnectionLifecycle {
        ConnectionLifecycle::default()
    }

    #[test]
    fn test_starts_disconnected() {
        let lifecycle = machine();
        assert_eq!(lifecycle.status(), ConnectionStatus::Disconnected);
        assert_eq!(lifecycle.attempts(), 0);
        assert!(lifecycle.last_error().is_none());
    }

    #[test]
    fn test_intent_then_success() {
        let mut lifecycle = machine();
        assert_eq!(lifecycle.connect_intent(), LifecycleAction::Dial);
        assert_eq!(lifecycle.status(), ConnectionStatus::Connecting);

        assert_eq!(lifecycle.connection_established(), LifecycleAction::None);
        assert_eq!(lifecycle.status(), ConnectionStatus::Connected);
        assert_eq!(lifecycle.attempts(), 0);
    }

    #[test]
    fn test_reference_backoff_schedule() {
        let mut lifecycle = machine();
        lifecycle.connect_intent();

        let expected_ms = [
            1_000u64, 2_000, 4_000, 8_000, 16_000, 30_000, 30_000, 30_000, 30_000, 30_000,
        ];

        for (i, &ms) in expected_ms.iter().enumerate() {
            let attempt = (i + 1) as u32;
            match lifecycle.dial_failed("refused".to_string()) {
                LifecycleAction::ScheduleRetry { delay, attempt: k } => {
                    assert_eq!(delay, Duration::from_millis(ms), "attempt {}", attempt);
                    assert_eq!(k, attempt);
                }
                other => panic!("expected retry for attempt {}, got {:?}", attempt, other),
            }
            assert_eq!(lifecycle.status(), ConnectionStatus::Reconnecting);
            assert_eq!(lifecycle.retry_due(), LifecycleAction::Dial);
        }

        // Budget spent: the next failure is terminal.
        assert_eq!(
            lifecycle.dial_failed("refused".to_string()),
            LifecycleAction::GiveUp
        );
        assert_eq!(lifecycle.status(), ConnectionStatus::Failed);

        // Failed is terminal for every automatic input.
        assert_eq!(lifecycle.retry_due(), LifecycleAction::None);
        assert_eq!(
            lifecycle.dial_failed("refused".to_string()),
            LifecycleAction::None
        );
        assert_eq!(lifecycle.status(), ConnectionStatus::Failed);
    }

    #[test]
    fn test_manual_reconnect_escapes_failed() {
        let mut lifecycle = machine();
        lifecycle.connect_intent();
        for _ in 0..11 {
            lifecycle.dial_failed("refused".to_string());
            lifecycle.retry_due();
        }
        assert_eq!(lifecycle.status(), ConnectionStatus::Failed);

        assert_eq!(lifecycle.manual_reconnect(), LifecycleAction::Dial);
        assert_eq!(lifecycle.status(), ConnectionStatus::Connecting);
        assert_eq!(lifecycle.attempts(), 0);
        assert!(lifecycle.last_error().is_none());

        // The schedule starts over from the base delay.
        assert_eq!(
            lifecycle.dial_failed("refused".to_string()),
            LifecycleAction::ScheduleRetry {
                delay: Duration::from_millis(1_000),
                attempt: 1,
            }
        );
    }

    #[test]
    fn test_success_resets_the_attempt_budget() {
        let mut lifecycle = machine();
        lifecycle.connect_intent();
        for _ in 0..3 {
            lifecycle.dial_failed("refused".to_string());
            lifecycle.retry_due();
        }
        assert_eq!(lifecycle.attempts(), 3);

        lifecycle.connection_established();
        assert_eq!(lifecycle.attempts(), 0);

        // A later drop schedules from the base delay again.
        assert_eq!(
            lifecycle.connection_lost("gone".to_string()),
            LifecycleAction::ScheduleRetry {
                delay: Duration::from_millis(1_000),
                attempt: 1,
            }
        );
        assert_eq!(lifecycle.last_error(), Some("gone"));
    }

    #[test]
    fn test_revoke_intent_never_passes_through_failed() {
        let mut lifecycle = machine();
        lifecycle.connect_intent();
        lifecycle.dial_failed("refused".to_string());
        assert_eq!(lifecycle.status(), ConnectionStatus::Reconnecting);

        assert_eq!(lifecycle.revoke_intent(), LifecycleAction::CancelRetry);
        assert_eq!(lifecycle.status(), ConnectionStatus::Disconnected);
        assert_eq!(lifecycle.attempts(), 0);

        // No stale inputs can move the machine after revocation.
        assert_eq!(lifecycle.retry_due(), LifecycleAction::None);
        assert_eq!(lifecycle.connection_established(), LifecycleAction::None);
        assert_eq!(lifecycle.status(), ConnectionStatus::Disconnected);
    }

    #[test]
    fn test_lost_connection_reenters_the_retry_loop() {
        let mut lifecycle = machine();
        lifecycle.connect_intent();
        lifecycle.connection_established();

        assert!(matches!(
            lifecycle.connection_lost("server closed".to_string()),
            LifecycleAction::ScheduleRetry { attempt: 1, .. }
        ));
        assert_eq!(lifecycle.status(), ConnectionStatus::Reconnecting);
        assert_eq!(lifecycle.retry_due(), LifecycleAction::Dial);
        assert_eq!(lifecycle.status(), ConnectionStatus::Connecting);
    }

    #[test]
    fn test_attempt_count_is_frozen_outside_retry_states() {
        let mut lifecycle = machine();
        // Inputs that do not apply to the current state change nothing.
        assert_eq!(
            lifecycle.dial_failed("x".to_string()),
            LifecycleAction::None
        );
        assert_eq!(
            lifecycle.connection_lost("x".to_string()),
            LifecycleAction::None
        );
        assert_eq!(lifecycle.retry_due(), LifecycleAction::None);
        assert_eq!(lifecycle.attempts(), 0);
        assert_eq!(lifecycle.status(), ConnectionStatus::Disconnected);
    }

    #[test]
    fn test_custom_backoff_parameters() {
        let mut lifecycle = ConnectionLifecycle::new(BackoffConfig {
            base: Duration::from_millis(100),
            cap: Duration::from_millis(250),
            max_attempts: 2,
        });
        lifecycle.connect_intent();

        assert_eq!(
            lifecycle.dial_failed("refused".to_string()),
            LifecycleAction::ScheduleRetry {
                delay: Duration::from_millis(100),
                attempt: 1,
            }
        );
        lifecycle.retry_due();
        assert_eq!(
            lifecycle.dial_failed("refused".to_string()),
            LifecycleAction::ScheduleRetry {
                delay: Duration::from_millis(200),
                attempt: 2,
            }
        );
        lifecycle.retry_due();
        assert_eq!(
            lifecycle.dial_failed("refused".to_string()),
            LifecycleAction::GiveUp
        );
    }
}
