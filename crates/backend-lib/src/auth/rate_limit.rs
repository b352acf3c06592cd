// ============================
// authority-backend/src/auth/rate_limit.rs
// ============================
//! Lockout of clients that keep failing to log in.

use dashmap::DashMap;
use metrics::counter;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::metrics::LOGIN_THROTTLED;

/// Default number of failed attempts before lockout
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default lockout duration (5 minutes)
pub const DEFAULT_LOCKOUT_DURATION: Duration = Duration::from_secs(5 * 60);

/// Failures older than this are forgotten by `cleanup`
const FAILURE_MEMORY: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone)]
struct Failures {
    count: u32,
    last_failure: Instant,
    locked_until: Option<Instant>,
}

/// Per-IP login failure counter
#[derive(Debug, Clone)]
pub struct AuthRateLimiter {
    failures: Arc<DashMap<IpAddr, Failures>>,
    max_attempts: u32,
    lockout_duration: Duration,
}

impl Default for AuthRateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_LOCKOUT_DURATION)
    }
}

impl AuthRateLimiter {
    pub fn new(max_attempts: u32, lockout_duration: Duration) -> Self {
        Self {
            failures: Arc::new(DashMap::new()),
            max_attempts,
            lockout_duration,
        }
    }

    /// Record a failed login from `ip`, locking it out once the limit is reached
    pub fn record_failed_attempt(&self, ip: IpAddr) {
        let now = Instant::now();
        let mut entry = self.failures.entry(ip).or_insert_with(|| Failures {
            count: 0,
            last_failure: now,
            locked_until: None,
        });

        // a served lockout starts a fresh count
        if entry.locked_until.is_some_and(|until| now >= until) {
            entry.count = 0;
            entry.locked_until = None;
        }

        entry.count += 1;
        entry.last_failure = now;

        if entry.count >= self.max_attempts && entry.locked_until.is_none() {
            entry.locked_until = Some(now + self.lockout_duration);
            counter!(LOGIN_THROTTLED).increment(1);
            tracing::warn!(%ip, attempts = entry.count, "client locked out of login");
        }
    }

    /// Forget failures from `ip` after it logs in
    pub fn record_success(&self, ip: IpAddr) {
        self.failures.remove(&ip);
    }

    /// Whether `ip` may attempt to log in now
    pub fn check_rate_limit(&self, ip: IpAddr) -> bool {
        self.retry_after(ip).is_none()
    }

    /// Remaining lockout for `ip`, if any
    pub fn retry_after(&self, ip: IpAddr) -> Option<Duration> {
        let entry = self.failures.get(&ip)?;
        let until = entry.locked_until?;
        until.checked_duration_since(Instant::now()).filter(|d| !d.is_zero())
    }

    /// Drop served lockouts and stale failure records
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.failures.retain(|_, entry| match entry.locked_until {
            Some(until) => now < until,
            None => now.duration_since(entry.last_failure) < FAILURE_MEMORY,
        });
    }
}
