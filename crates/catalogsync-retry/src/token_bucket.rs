//! Token-bucket rate limiting, adapted nearly verbatim from the shape
//! used elsewhere in this workspace for the upstream-table and
//! image-download rate limiters (spec §4.2, §4.4, §5).

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

struct Inner {
    tokens: f64,
    last_refill: Instant,
}

/// Classic token bucket: tokens are consumed on each request and
/// refilled at a constant rate. Thread-safe via an internal mutex.
pub struct TokenBucket {
    original_capacity: u32,
    effective_capacity: Mutex<u32>,
    refill_rate: f64,
    inner: Mutex<Inner>,
    success_count: Mutex<u64>,
}

impl TokenBucket {
    /// Creates a bucket starting full.
    #[must_use]
    pub fn new(capacity: u32, refill_rate: f64) -> Self {
        Self {
            original_capacity: capacity,
            effective_capacity: Mutex::new(capacity),
            refill_rate,
            inner: Mutex::new(Inner {
                tokens: capacity as f64,
                last_refill: Instant::now(),
            }),
            success_count: Mutex::new(0),
        }
    }

    fn refill(inner: &mut Inner, refill_rate: f64, effective_capacity: u32) {
        let now = Instant::now();
        let elapsed = now.duration_since(inner.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            inner.tokens = (inner.tokens + elapsed * refill_rate).min(effective_capacity as f64);
            inner.last_refill = now;
        }
    }

    /// Attempts to take one token. Returns `false` without mutating state
    /// if none is available.
    pub fn try_acquire(&self) -> bool {
        let cap = *self.effective_capacity.lock().unwrap();
        let mut inner = self.inner.lock().unwrap();
        Self::refill(&mut inner, self.refill_rate, cap);
        if inner.tokens >= 1.0 {
            inner.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Estimated wait until a token is available.
    #[must_use]
    pub fn time_until_available(&self) -> Duration {
        let cap = *self.effective_capacity.lock().unwrap();
        let mut inner = self.inner.lock().unwrap();
        Self::refill(&mut inner, self.refill_rate, cap);
        if inner.tokens >= 1.0 {
            Duration::ZERO
        } else if self.refill_rate > 0.0 {
            Duration::from_secs_f64(((1.0 - inner.tokens) / self.refill_rate).max(0.001))
        } else {
            Duration::from_secs(1)
        }
    }

    /// Blocks (asynchronously) until a token is available, then takes it.
    pub async fn acquire(&self) {
        loop {
            if self.try_acquire() {
                return;
            }
            tokio::time::sleep(self.time_until_available()).await;
        }
    }

    /// Every 100 consecutive successes, grows effective capacity by 5%
    /// back toward the original capacity.
    pub fn on_success(&self) {
        let mut count = self.success_count.lock().unwrap();
        *count += 1;
        if *count % 100 == 0 {
            let mut cap = self.effective_capacity.lock().unwrap();
            if *cap < self.original_capacity {
                let increase = ((*cap as f64) * 0.05).max(1.0) as u32;
                let new_cap = (*cap + increase).min(self.original_capacity);
                debug!(old_capacity = *cap, new_capacity = new_cap, "rate limiter recovering capacity");
                *cap = new_cap;
            }
        }
    }

    /// Halves effective capacity on a throttle signal (HTTP 429), floor 1.
    pub fn on_throttle(&self) {
        let mut cap = self.effective_capacity.lock().unwrap();
        let old = *cap;
        *cap = (*cap / 2).max(1);
        warn!(old_capacity = old, new_capacity = *cap, "rate limiter throttled, halving capacity");
        *self.success_count.lock().unwrap() = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquires_up_to_capacity_then_blocks() {
        let bucket = TokenBucket::new(2, 1.0);
        assert!(bucket.try_acquire());
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());
    }

    #[test]
    fn throttle_halves_and_success_recovers() {
        let bucket = TokenBucket::new(100, 10.0);
        bucket.on_throttle();
        assert_eq!(*bucket.effective_capacity.lock().unwrap(), 50);
        for _ in 0..100 {
            bucket.on_success();
        }
        assert_eq!(*bucket.effective_capacity.lock().unwrap(), 52);
    }
}
