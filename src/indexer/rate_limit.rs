//! Per-indexer rate limiting
//!
//! Each indexer carries a token bucket for its configured requests-per-second
//! and a semaphore bounding concurrent requests. Health-check traffic goes
//! through the same limiter as searches.

use tokio::sync::{Mutex, Semaphore, SemaphorePermit};
use tokio::time::{Duration, Instant};

use crate::config::RateLimitConfig;

/// Token bucket refilled at a constant per-second rate. Starts full.
pub struct TokenBucket {
    capacity: f32,
    tokens: f32,
    refill_rate: f32,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(requests_per_second: u32) -> Self {
        let capacity = requests_per_second.max(1) as f32;
        Self {
            capacity,
            tokens: capacity,
            refill_rate: capacity,
            last_refill: Instant::now(),
        }
    }

    /// Take one token, or report how long to wait for it
    pub fn try_acquire(&mut self) -> std::result::Result<(), Duration> {
        self.refill();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            let tokens_needed = 1.0 - self.tokens;
            let wait_secs = tokens_needed / self.refill_rate;
            Err(Duration::from_secs_f32(wait_secs))
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f32();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }
}

/// Combined concurrency cap + request rate for one indexer
pub struct IndexerLimiter {
    bucket: Mutex<TokenBucket>,
    semaphore: Semaphore,
}

impl IndexerLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            bucket: Mutex::new(TokenBucket::new(config.requests_per_second)),
            semaphore: Semaphore::new(config.max_concurrent),
        }
    }

    /// Wait for both a concurrency slot and a rate token. The returned permit
    /// releases the slot when dropped.
    pub async fn acquire(&self) -> SemaphorePermit<'_> {
        let permit = self
            .semaphore
            .acquire()
            .await
            .expect("limiter semaphore never closed");

        loop {
            let wait = {
                let mut bucket = self.bucket.lock().await;
                match bucket.try_acquire() {
                    Ok(()) => break,
                    Err(wait) => wait,
                }
            };
            tokio::time::sleep(wait).await;
        }

        permit
    }
}
