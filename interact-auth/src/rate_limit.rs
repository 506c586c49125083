use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::warn;

#[derive(Debug)]
struct RateWindow {
    started_at: Instant,
    count: u64,
}

#[derive(Debug)]
struct Windows {
    by_key: HashMap<String, RateWindow>,
    last_prune: Instant,
}

/// Fixed-window rate limiter keyed by caller identity.
///
/// Expired windows are pruned lazily, at most once per period, so the map
/// stays bounded by the number of keys active within one period. State is
/// process-local; horizontally scaled deployments need to swap this for a
/// shared counter store.
#[derive(Debug)]
pub struct KeyedRateLimiter {
    limit: u64,
    period: Duration,
    windows: Mutex<Windows>,
}

impl KeyedRateLimiter {
    pub fn new(limit: u64, period: Duration) -> Self {
        Self {
            limit,
            period,
            windows: Mutex::new(Windows {
                by_key: HashMap::new(),
                last_prune: Instant::now(),
            }),
        }
    }

    pub fn per_minute(limit: u64) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    pub fn unlimited() -> Self {
        Self::new(u64::MAX, Duration::from_secs(60))
    }

    /// Records one request for `key`. Returns `false` when the key has
    /// exhausted its budget for the current window.
    pub fn try_acquire(&self, key: &str) -> bool {
        if self.limit == 0 {
            return true;
        }

        let mut windows = self.windows.lock();
        let now = Instant::now();

        if now.duration_since(windows.last_prune) >= self.period {
            let period = self.period;
            windows
                .by_key
                .retain(|_, window| now.duration_since(window.started_at) < period);
            windows.last_prune = now;
        }

        let window = windows
            .by_key
            .entry(key.to_string())
            .or_insert_with(|| RateWindow {
                started_at: now,
                count: 0,
            });

        if now.duration_since(window.started_at) >= self.period {
            window.started_at = now;
            window.count = 0;
        }

        if window.count < self.limit {
            window.count += 1;
            true
        } else {
            warn!(key, limit = self.limit, "rate limit exceeded");
            false
        }
    }
}
