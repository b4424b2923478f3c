//! Fixed-interval pacing for outbound API calls.
//!
//! Crossref asks polite-pool clients to keep request rates modest. A single
//! shared gate guarantees successive calls are at least the configured
//! interval apart, regardless of how long each call itself takes.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Fixed-interval gate: `wait()` returns no sooner than `interval` after the
/// previous `wait()` returned.
pub struct RateGate {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl RateGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    /// Block until the pacing interval since the previous call has elapsed.
    pub async fn wait(&self) {
        let mut last = self.last.lock().await;
        if let Some(prev) = *last {
            let due = prev + self.interval;
            let now = Instant::now();
            if due > now {
                let pause = due - now;
                debug!(pause_ms = pause.as_millis() as u64, "Pacing delay");
                sleep(pause).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_call_is_immediate() {
        let gate = RateGate::new(Duration::from_secs(1));
        let start = Instant::now();
        gate.wait().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_call_waits_interval() {
        let gate = RateGate::new(Duration::from_secs(1));
        gate.wait().await;
        let start = Instant::now();
        gate.wait().await;
        assert!(start.elapsed() >= Duration::from_secs(1));
    }
}
