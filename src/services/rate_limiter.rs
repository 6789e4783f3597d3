use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{sleep, Duration, Instant};

/// Spaces outgoing provider requests to stay under a per-minute quota and
/// caps how many are in flight.
pub struct RequestThrottle {
    in_flight: Arc<Semaphore>,
    next_slot: Mutex<Instant>,
    spacing: Duration,
}

impl RequestThrottle {
    pub fn new(max_in_flight: usize, requests_per_minute: u32) -> Self {
        let spacing = Duration::from_millis(60_000 / requests_per_minute.max(1) as u64);
        Self {
            in_flight: Arc::new(Semaphore::new(max_in_flight.max(1))),
            next_slot: Mutex::new(Instant::now()),
            spacing,
        }
    }

    /// Wait for a free slot. The returned permit frees it when dropped.
    pub async fn acquire(&self) -> Option<ThrottlePermit> {
        let permit = self.in_flight.clone().acquire_owned().await.ok()?;

        // reserve the slot under the lock, sleep outside it
        let slot = {
            let mut next = self.next_slot.lock();
            let now = Instant::now();
            let slot = (*next).max(now);
            *next = slot + self.spacing;
            slot
        };
        let wait = slot.saturating_duration_since(Instant::now());
        if !wait.is_zero() {
            sleep(wait).await;
        }

        Some(ThrottlePermit { _permit: permit })
    }

    pub fn spacing(&self) -> Duration {
        self.spacing
    }
}

pub struct ThrottlePermit {
    _permit: OwnedSemaphorePermit,
}
