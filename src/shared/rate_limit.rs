//! Sliding-window API rate limiter (calls per minute).

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

const WINDOW: Duration = Duration::from_secs(60);

/// Allows at most `calls_per_minute` calls in any 60 s window. Callers await
/// `wait_if_needed()` before each request.
pub struct RateLimiter {
    calls_per_minute: usize,
    calls: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(calls_per_minute: u32) -> Self {
        Self {
            calls_per_minute: calls_per_minute.max(1) as usize,
            calls: Mutex::new(VecDeque::new()),
        }
    }

    /// Sleep until a call is allowed, then record it.
    pub async fn wait_if_needed(&self) {
        let mut calls = self.calls.lock().await;
        loop {
            let now = Instant::now();
            while calls
                .front()
                .is_some_and(|t| now.duration_since(*t) >= WINDOW)
            {
                calls.pop_front();
            }
            if calls.len() < self.calls_per_minute {
                calls.push_back(now);
                return;
            }
            let Some(oldest) = calls.front().copied() else {
                continue;
            };
            let wait = WINDOW.saturating_sub(now.duration_since(oldest));
            debug!(wait_ms = wait.as_millis() as u64, "rate limit reached; waiting");
            tokio::time::sleep(wait).await;
        }
    }

    /// Calls recorded in the current window.
    pub async fn in_window(&self) -> usize {
        let now = Instant::now();
        self.calls
            .lock()
            .await
            .iter()
            .filter(|t| now.duration_since(**t) < WINDOW)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_under_limit_does_not_wait() {
        let limiter = RateLimiter::new(5);
        let started = std::time::Instant::now();
        for _ in 0..5 {
            limiter.wait_if_needed().await;
        }
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(limiter.in_window().await, 5);
    }

    #[tokio::test]
    async fn test_zero_is_clamped_to_one() {
        let limiter = RateLimiter::new(0);
        limiter.wait_if_needed().await;
        assert_eq!(limiter.in_window().await, 1);
    }
}
