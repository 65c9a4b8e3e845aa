//! Single-slot retry timer.
//!
//! At most one retry is ever armed. Arming a new one or cancelling
//! bumps a sequence token, so a timer task that already fired but has
//! not been processed yet can be recognized as stale and ignored.

use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

/// Token carried by a fired timer, checked against the timer's current
/// sequence before the retry is acted on.
pub type RetryToken = u64;

pub struct RetryTimer<E> {
    seq: RetryToken,
    task: Option<JoinHandle<()>>,
    make_event: fn(RetryToken) -> E,
}

impl<E: Send + 'static> RetryTimer<E> {
    /// `make_event` wraps the token into the driver's event type.
    pub fn new(make_event: fn(RetryToken) -> E) -> Self {
        Self {
            seq: 0,
            task: None,
            make_event,
        }
    }

    /// Arms the timer, replacing any pending one.
    pub fn schedule(&mut self, delay: Duration, events: UnboundedSender<E>) {
        self.cancel();
        let token = self.seq;
        let make_event = self.make_event;
        self.task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(make_event(token));
        }));
    }

    /// Disarms the pending timer, if any, and invalidates tokens it may
    /// already have emitted.
    pub fn cancel(&mut self) {
        self.seq = self.seq.wrapping_add(1);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Whether a fired token belongs to the currently armed timer.
    pub fn accepts(&self, token: RetryToken) -> bool {
        self.task.is_some() && token == self.seq
    }

    /// Marks the armed timer as consumed after its token was accepted.
    pub fn disarm(&mut self) {
        self.seq = self.seq.wrapping_add(1);
        self.task = None;
    }
}

impl<E> Drop for RetryTimer<E> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[derive(Debug, PartialEq, Eq)]
    struct Fired(RetryToken);

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_the_delay() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = RetryTimer::new(Fired);

        timer.schedule(Duration::from_secs(5), tx);
        let fired = rx.recv().await.unwrap();
        assert!(timer.accepts(fired.0));

        timer.disarm();
        assert!(!timer.accepts(fired.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_invalidates_an_already_fired_token() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = RetryTimer::new(Fired);

        timer.schedule(Duration::from_secs(1), tx.clone());
        let fired = rx.recv().await.unwrap();

        // Cancelled after firing but before being processed.
        timer.cancel();
        assert!(!timer.accepts(fired.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rescheduling_replaces_the_pending_timer() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = RetryTimer::new(Fired);

        timer.schedule(Duration::from_secs(60), tx.clone());
        timer.schedule(Duration::from_secs(1), tx);

        let fired = rx.recv().await.unwrap();
        assert!(timer.accepts(fired.0));
        timer.disarm();

        // The first timer was aborted, so nothing else arrives.
        assert!(rx.try_recv().is_err());
    }
}
