//! Keep-alive/timeout machinery: the client is expected to send a
//! keep-alive every `interval`; missing one starts a timeout countdown,
//! and expiring it enqueues [`Message::Timeout`].

use crate::session::queue::{Message, MessageQueue};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};

/// Shared last-activity clock; the connection's reader calls `touch()` on
/// every received frame, the sweep task reads `elapsed()`.
#[derive(Clone)]
pub struct ActivityClock(Arc<Mutex<Instant>>);

impl ActivityClock {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(Instant::now())))
    }

    pub fn touch(&self) {
        *self.0.lock() = Instant::now();
    }

    pub fn elapsed(&self) -> Duration {
        self.0.lock().elapsed()
    }
}

impl Default for ActivityClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives the keep-alive sweep for one connection: wakes every
/// `interval`, and once `interval + timeout` has elapsed since the last
/// activity, enqueues a [`Message::Timeout`] and returns.
pub async fn run(clock: ActivityClock, interval: Duration, timeout: Duration, queue: MessageQueue) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if clock.elapsed() > interval + timeout {
            let _ = queue.send(Message::Timeout);
            return;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::session::queue;

    #[tokio::test(start_paused = true)]
    async fn expires_after_interval_plus_timeout() {
        let clock = ActivityClock::new();
        let (tx, mut rx) = queue::channel();
        let handle = tokio::spawn(run(clock, Duration::from_secs(10), Duration::from_secs(30), tx));

        tokio::time::advance(Duration::from_secs(41)).await;
        handle.await.unwrap();

        assert!(matches!(rx.try_recv(), Some(Message::Timeout)));
    }

    #[tokio::test(start_paused = true)]
    async fn activity_within_window_prevents_timeout() {
        let clock = ActivityClock::new();
        let (tx, mut rx) = queue::channel();
        let clock_for_task = clock.clone();
        let handle = tokio::spawn(run(clock_for_task, Duration::from_secs(10), Duration::from_secs(30), tx));

        tokio::time::advance(Duration::from_secs(15)).await;
        clock.touch();
        tokio::time::advance(Duration::from_secs(15)).await;

        assert!(rx.try_recv().is_none());
        handle.abort();
    }
}
