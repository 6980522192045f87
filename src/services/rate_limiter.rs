//! In-memory rate limiting for public subjects.
//!
//! `PublicRateLimits` holds one sliding-window limiter per public endpoint
//! (contact submit, analytics ingestion, login). Limits are in-memory and
//! reset on process restart; safe to share via `Arc` across handler tasks.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Sliding-window limiter — tracks per-key attempt timestamps.
pub struct RateLimiter {
    attempts: Mutex<HashMap<String, Vec<Instant>>>,
    max_attempts: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_attempts: usize, window_secs: u64) -> Self {
        Self {
            attempts: Mutex::new(HashMap::new()),
            max_attempts,
            window: Duration::from_secs(window_secs),
        }
    }

    /// Check `key` against the limit. Returns `true` if the request is
    /// allowed (and records it), `false` if rate-limited.
    pub fn check_and_record(&self, key: &str) -> bool {
        let mut attempts = self.attempts.lock();
        let now = Instant::now();

        let entry = attempts.entry(key.to_string()).or_default();
        entry.retain(|t| now.duration_since(*t) < self.window);

        if entry.len() >= self.max_attempts {
            return false;
        }
        entry.push(now);
        true
    }

    /// Drop expired entries (call periodically to bound memory).
    pub fn cleanup(&self) {
        let mut attempts = self.attempts.lock();
        let now = Instant::now();
        attempts.retain(|_, entries| {
            entries.retain(|t| now.duration_since(*t) < self.window);
            !entries.is_empty()
        });
    }
}

/// Limiters for every public subject, keyed by client IP (or email for login).
pub struct PublicRateLimits {
    /// Contact form: 5 submissions per 10 minutes per IP
    pub contact_submit: RateLimiter,
    /// Analytics ingestion: 120 writes per minute per IP
    pub analytics_ingest: RateLimiter,
    /// Login: 5 attempts per 15 minutes per email
    pub login: RateLimiter,
}

impl PublicRateLimits {
    pub fn new() -> Self {
        Self {
            contact_submit: RateLimiter::new(5, 600),
            analytics_ingest: RateLimiter::new(120, 60),
            login: RateLimiter::new(5, 900),
        }
    }
}

impl Default for PublicRateLimits {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_up_to_max_attempts() {
        let limiter = RateLimiter::new(3, 60);
        assert!(limiter.check_and_record("1.2.3.4"));
        assert!(limiter.check_and_record("1.2.3.4"));
        assert!(limiter.check_and_record("1.2.3.4"));
        assert!(!limiter.check_and_record("1.2.3.4"));
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = RateLimiter::new(1, 60);
        assert!(limiter.check_and_record("1.2.3.4"));
        assert!(limiter.check_and_record("5.6.7.8"));
        assert!(!limiter.check_and_record("1.2.3.4"));
    }

    #[test]
    fn test_window_expiry() {
        let limiter = RateLimiter::new(1, 0);
        assert!(limiter.check_and_record("k"));
        // zero-second window: the previous attempt is already expired
        assert!(limiter.check_and_record("k"));
    }

    #[test]
    fn test_cleanup_removes_expired() {
        let limiter = RateLimiter::new(5, 0);
        limiter.check_and_record("k");
        limiter.cleanup();
        assert!(limiter.attempts.lock().is_empty());
    }
}
