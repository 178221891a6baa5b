//! Rate Limiter (Token Bucket)
//!
//! Guards the submission endpoint. One bucket shared by every connection.

use std::sync::Mutex;
use std::time::Instant;

pub struct RateLimiter {
    bucket: Mutex<Bucket>,
    burst: f64,
    refill_per_sec: f64,
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    /// # Arguments
    /// * `burst` - Maximum tokens held at once
    /// * `refill_per_sec` - Tokens added per second
    pub fn new(burst: u32, refill_per_sec: u32) -> Self {
        Self {
            bucket: Mutex::new(Bucket {
                tokens: f64::from(burst),
                last_refill: Instant::now(),
            }),
            burst: f64::from(burst),
            refill_per_sec: f64::from(refill_per_sec),
        }
    }

    /// Take one token. Returns false when the caller should be throttled.
    pub fn try_acquire(&self) -> bool {
        let mut bucket = match self.bucket.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(self.burst);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_allows_burst_then_throttles() {
        let limiter = RateLimiter::new(10, 0);

        for _ in 0..10 {
            assert!(limiter.try_acquire());
        }
        assert!(!limiter.try_acquire());
    }

    #[tokio::test]
    async fn test_refills_over_time() {
        let limiter = RateLimiter::new(5, 20);
        for _ in 0..5 {
            assert!(limiter.try_acquire());
        }
        assert!(!limiter.try_acquire());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(limiter.try_acquire());
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_the_burst() {
        let limiter = Arc::new(RateLimiter::new(100, 0));

        let mut handles = vec![];
        for _ in 0..10 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move {
                (0..20).filter(|_| limiter.try_acquire()).count()
            }));
        }

        let mut total_allowed = 0;
        for handle in handles {
            total_allowed += handle.await.unwrap();
        }
        assert_eq!(total_allowed, 100);
    }
}
