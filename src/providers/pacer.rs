// =============================================================================
// Request Pacer: spaces out calls to rate-limited upstream providers
// =============================================================================
//
// The options-chain API tolerates a modest request rate only. Every caller
// awaits `acquire()` before issuing a request; the pacer guarantees at least
// `min_interval` between consecutive grants. Counters are atomic so a
// snapshot can be taken without touching the lock.
// =============================================================================

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

pub struct RequestPacer {
    min_interval: Duration,
    last_grant: Mutex<Option<Instant>>,
    requests_granted: AtomicU32,
    total_wait_ms: AtomicU64,
}

/// Serialisable view of the pacer counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacerSnapshot {
    pub requests_granted: u32,
    pub total_wait_ms: u64,
}

impl RequestPacer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_grant: Mutex::new(None),
            requests_granted: AtomicU32::new(0),
            total_wait_ms: AtomicU64::new(0),
        }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    /// Wait until the next request may be sent.
    pub async fn acquire(&self) {
        let mut last = self.last_grant.lock().await;

        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                debug!(wait_ms = wait.as_millis() as u64, "pacing upstream request");
                tokio::time::sleep(wait).await;
                self.total_wait_ms
                    .fetch_add(wait.as_millis() as u64, Ordering::Relaxed);
            }
        }

        *last = Some(Instant::now());
        self.requests_granted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PacerSnapshot {
        PacerSnapshot {
            requests_granted: self.requests_granted.load(Ordering::Relaxed),
            total_wait_ms: self.total_wait_ms.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for RequestPacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestPacer")
            .field("min_interval", &self.min_interval)
            .field("requests_granted", &self.requests_granted.load(Ordering::Relaxed))
            .finish()
    }
}
