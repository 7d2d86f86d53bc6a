//! Redis-backed fixed-window counters.
//!
//! Each key is incremented atomically; the first hit in a window arms the
//! TTL, and the window resets when the TTL elapses, restarting the count at
//! 1. Counters are shared across all instances, so limits hold under
//! horizontal scaling.

use deadpool_redis::Pool;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::error;

const COUNTER_PREFIX: &str = "ratelimit:";

#[derive(Clone)]
pub struct RateLimitCounters {
    pool: Option<Pool>,
}

/// Observed state of a window after an increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowHit {
    /// This request's position within the window (1-based).
    pub count: u64,
    /// Time until the window resets.
    pub reset_in: Duration,
}

impl RateLimitCounters {
    pub fn new(pool: Option<Pool>) -> Self {
        Self { pool }
    }

    pub fn is_available(&self) -> bool {
        self.pool.is_some()
    }

    /// Atomically counts a request against `key` within a fixed window.
    pub async fn hit(&self, key: &str, window: Duration) -> Result<WindowHit, CounterError> {
        let pool = self.pool.as_ref().ok_or(CounterError::NoBackend)?;
        let mut conn = pool.get().await.map_err(|e| {
            error!(error = %e, "Failed to get Redis connection");
            CounterError::ConnectionFailed
        })?;

        let full_key = format!("{}{}", COUNTER_PREFIX, key);
        let window_ms = window.as_millis().min(i64::MAX as u128) as i64;

        let count: u64 = conn.incr(&full_key, 1u64).await.map_err(|e| {
            error!(error = %e, key = %full_key, "Counter increment failed");
            CounterError::OperationFailed
        })?;

        if count == 1 {
            conn.pexpire::<_, ()>(&full_key, window_ms).await.map_err(|e| {
                error!(error = %e, key = %full_key, "Failed to arm window TTL");
                CounterError::OperationFailed
            })?;
            return Ok(WindowHit {
                count,
                reset_in: window,
            });
        }

        let ttl_ms: i64 = conn.pttl(&full_key).await.map_err(|e| {
            error!(error = %e, key = %full_key, "Failed to read window TTL");
            CounterError::OperationFailed
        })?;

        // A key without a TTL means a crash happened between INCR and
        // PEXPIRE; re-arm rather than leaving the counter immortal.
        let reset_in = if ttl_ms > 0 {
            Duration::from_millis(ttl_ms as u64)
        } else {
            conn.pexpire::<_, ()>(&full_key, window_ms).await.ok();
            window
        };

        Ok(WindowHit { count, reset_in })
    }

    /// Round-trips the backend, returning the observed latency.
    pub async fn ping(&self) -> Result<Duration, CounterError> {
        let pool = self.pool.as_ref().ok_or(CounterError::NoBackend)?;
        let start = std::time::Instant::now();

        let mut conn = pool
            .get()
            .await
            .map_err(|_| CounterError::ConnectionFailed)?;

        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|_| CounterError::OperationFailed)?;

        Ok(start.elapsed())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CounterError {
    NoBackend,
    ConnectionFailed,
    OperationFailed,
}

impl std::fmt::Display for CounterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CounterError::NoBackend => write!(f, "Redis not configured"),
            CounterError::ConnectionFailed => write!(f, "Redis connection failed"),
            CounterError::OperationFailed => write!(f, "Redis operation failed"),
        }
    }
}

impl std::error::Error for CounterError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_without_redis() {
        let counters = RateLimitCounters::new(None);
        assert!(!counters.is_available());
    }

    #[tokio::test]
    async fn test_hit_without_redis_reports_no_backend() {
        let counters = RateLimitCounters::new(None);
        let result = counters.hit("u:api", Duration::from_secs(60)).await;
        assert_eq!(result.unwrap_err(), CounterError::NoBackend);
    }

    #[tokio::test]
    async fn test_ping_without_redis_reports_no_backend() {
        let counters = RateLimitCounters::new(None);
        assert_eq!(counters.ping().await.unwrap_err(), CounterError::NoBackend);
    }
}
