//! Start-up deadline for provider polling.

use std::time::Duration;
use tokio::time::{Instant, sleep};

/// Bounds the start-up polling loops.
///
/// Uses the tokio clock so paused-time tests advance it.
#[derive(Debug, Clone, Copy)]
pub struct StartupTimer {
    started: Instant,
    duration: Duration,
    interval: Duration,
}

impl StartupTimer {
    /// Start a timer that elapses after `duration`, polling every `interval`.
    pub fn new(duration: Duration, interval: Duration) -> Self {
        Self {
            started: Instant::now(),
            duration,
            interval,
        }
    }

    /// Whether the deadline is still ahead.
    pub fn has_not_elapsed(&self) -> bool {
        self.started.elapsed() < self.duration
    }

    /// Time left before the deadline.
    pub fn remaining(&self) -> Duration {
        self.duration.saturating_sub(self.started.elapsed())
    }

    /// Sleep for one polling interval.
    pub async fn sleep_for_interval(&self) {
        sleep(self.interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_elapses_after_duration() {
        let timer = StartupTimer::new(Duration::from_secs(3), Duration::from_secs(1));
        let mut polls = 0;
        while timer.has_not_elapsed() {
            polls += 1;
            timer.sleep_for_interval().await;
        }
        assert_eq!(polls, 3);
        assert_eq!(timer.remaining(), Duration::ZERO);
    }
}
