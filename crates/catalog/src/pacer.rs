use std::time::Duration;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::trace;

/// Keeps consecutive fetch starts at least `min_interval` apart.
///
/// The first call never waits.
#[derive(Debug)]
pub struct FetchPacer {
    min_interval: Duration,
    last_start: Option<Instant>,
}

impl FetchPacer {
    pub fn new(min_interval: Duration) -> Self {
        Self { min_interval, last_start: None }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Sleep until the next fetch may start, then mark it started.
    /// Returns how long the caller was held back.
    pub async fn wait(&mut self) -> Duration {
        let now = Instant::now();
        let held = match self.last_start {
            None => Duration::ZERO,
            Some(last) => match last.checked_add(self.min_interval) {
                Some(ready) if ready > now => {
                    trace!(wait_ms = (ready - now).as_millis() as u64, "Pacing catalog fetch");
                    sleep_until(ready).await;
                    ready - now
                }
                Some(_) => Duration::ZERO,
                // Past the clock's range; tokio caps the sleep itself.
                None => {
                    let remaining = self.min_interval.saturating_sub(now - last);
                    sleep(remaining).await;
                    remaining
                }
            },
        };
        self.last_start = Some(Instant::now());
        held
    }
}
