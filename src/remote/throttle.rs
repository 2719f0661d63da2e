use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Spaces calls to one remote store at least `min_interval` apart.
#[derive(Debug)]
pub struct RequestThrottle {
    min_interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RequestThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self { min_interval, next_slot: Mutex::new(None) }
    }

    pub fn min_interval(&self) -> Duration { self.min_interval }

    /// Waits for this caller's slot. Slots are handed out in call order.
    pub async fn acquire(&self) {
        if self.min_interval.is_zero() {
            return;
        }

        let slot = {
            let mut guard = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match *guard {
                Some(next) if next > now => next,
                _ => now,
            };
            *guard = Some(slot + self.min_interval);
            slot
        };

        tokio::time::sleep_until(slot).await;
    }
}
