//! Per-key sliding-window admission control.
//!
//! Each key keeps a queue of admission instants. A request is admitted iff the
//! number of instants inside the window is below the caller-supplied limit.
//! Time-dependent methods have `*_at(now)` forms for deterministic tests.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::{ConfigError, ConfigResult};

fn default_window_secs() -> u64 {
    60
}
fn default_idle_secs() -> u64 {
    300
}
fn default_limit() -> usize {
    60
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitSettings {
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Keys idle longer than this are dropped by `cleanup_idle`.
    #[serde(default = "default_idle_secs")]
    pub idle_secs: u64,
    /// Requests per window when the caller has no specific limit.
    #[serde(default = "default_limit")]
    pub default_limit: usize,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            idle_secs: default_idle_secs(),
            default_limit: default_limit(),
        }
    }
}

impl RateLimitSettings {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.window_secs == 0 {
            return Err(ConfigError::InvalidSetting {
                field: "rate_limit.window_secs",
                reason: "must be at least 1 second".to_string(),
            });
        }
        if self.default_limit == 0 {
            return Err(ConfigError::InvalidSetting {
                field: "rate_limit.default_limit",
                reason: "must admit at least one request".to_string(),
            });
        }
        Ok(())
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn idle(&self) -> Duration {
        Duration::from_secs(self.idle_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimiterStats {
    pub tracked_keys: usize,
    pub window_secs: u64,
}

#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    windows: Mutex<HashMap<String, VecDeque<Instant>>>,
}

fn prune(queue: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(front) = queue.front() {
        if now.saturating_duration_since(*front) > window {
            queue.pop_front();
        } else {
            break;
        }
    }
}

impl RateLimiter {
    /// A zero window is raised to one second.
    pub fn new(window: Duration) -> Self {
        let window = if window.is_zero() {
            Duration::from_secs(1)
        } else {
            window
        };
        Self {
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_settings(settings: &RateLimitSettings) -> Self {
        Self::new(settings.window())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, VecDeque<Instant>>> {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn check(&self, key: &str, limit: usize) -> bool {
        self.check_at(key, limit, Instant::now())
    }

    /// Admit and record one request for `key`, or reject without recording.
    pub fn check_at(&self, key: &str, limit: usize, now: Instant) -> bool {
        let mut map = self.lock();
        let queue = map.entry(key.to_string()).or_default();
        prune(queue, now, self.window);
        if queue.len() >= limit {
            drop(map);
            warn!(target: "rate_limit", key = %crate::telemetry::anon_hash(key), limit, "rate limit exceeded");
            crate::metrics::rate_limited();
            return false;
        }
        queue.push_back(now);
        true
    }

    pub fn remaining(&self, key: &str, limit: usize) -> usize {
        self.remaining_at(key, limit, Instant::now())
    }

    /// Remaining admissions in the current window. Never creates a key.
    pub fn remaining_at(&self, key: &str, limit: usize, now: Instant) -> usize {
        let mut map = self.lock();
        match map.get_mut(key) {
            Some(queue) => {
                prune(queue, now, self.window);
                limit.saturating_sub(queue.len())
            }
            None => limit,
        }
    }

    /// Forget a key entirely (key rotation).
    pub fn reset(&self, key: &str) {
        self.lock().remove(key);
    }

    pub fn cleanup_idle(&self, idle: Duration) -> usize {
        self.cleanup_idle_at(idle, Instant::now())
    }

    /// Drop empty queues and keys whose newest admission is older than `idle`.
    pub fn cleanup_idle_at(&self, idle: Duration, now: Instant) -> usize {
        let mut map = self.lock();
        let before = map.len();
        map.retain(|_, q| match q.back() {
            Some(last) => now.saturating_duration_since(*last) <= idle,
            None => false,
        });
        let removed = before - map.len();
        if removed > 0 {
            debug!(target: "rate_limit", removed, remaining = map.len(), "idle keys evicted");
        }
        removed
    }

    pub fn stats(&self) -> RateLimiterStats {
        RateLimiterStats {
            tracked_keys: self.lock().len(),
            window_secs: self.window.as_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_at_exact_limit_then_recovers() {
        let rl = RateLimiter::new(Duration::from_secs(60));
        let t0 = Instant::now();
        for i in 0..3 {
            assert!(rl.check_at("k", 3, t0 + Duration::from_secs(i)), "request {i}");
        }
        assert!(!rl.check_at("k", 3, t0 + Duration::from_secs(10)));
        assert_eq!(rl.remaining_at("k", 3, t0 + Duration::from_secs(10)), 0);

        // first admission leaves the window after 60s
        let later = t0 + Duration::from_secs(61);
        assert_eq!(rl.remaining_at("k", 3, later), 1);
        assert!(rl.check_at("k", 3, later));
    }

    #[test]
    fn rejection_is_not_recorded() {
        let rl = RateLimiter::new(Duration::from_secs(60));
        let t0 = Instant::now();
        assert!(rl.check_at("k", 1, t0));
        assert!(!rl.check_at("k", 1, t0));
        assert!(!rl.check_at("k", 1, t0));
        assert!(rl.check_at("k", 1, t0 + Duration::from_secs(61)));
    }

    #[test]
    fn remaining_does_not_create_keys() {
        let rl = RateLimiter::new(Duration::from_secs(60));
        assert_eq!(rl.remaining("ghost", 5), 5);
        assert_eq!(rl.stats().tracked_keys, 0);
    }

    #[test]
    fn keys_are_independent_and_resettable() {
        let rl = RateLimiter::new(Duration::from_secs(60));
        let t0 = Instant::now();
        assert!(rl.check_at("a", 1, t0));
        assert!(rl.check_at("b", 1, t0));
        assert!(!rl.check_at("a", 1, t0));
        rl.reset("a");
        assert!(rl.check_at("a", 1, t0));
    }

    #[test]
    fn cleanup_removes_idle_and_empty() {
        let rl = RateLimiter::new(Duration::from_secs(10));
        let t0 = Instant::now();
        rl.check_at("old", 5, t0);
        rl.check_at("fresh", 5, t0 + Duration::from_secs(290));
        // zero limit rejects but still creates the queue
        assert!(!rl.check_at("empty", 0, t0));

        let removed = rl.cleanup_idle_at(Duration::from_secs(300), t0 + Duration::from_secs(301));
        assert_eq!(removed, 2);
        assert_eq!(rl.stats().tracked_keys, 1);
        assert_eq!(rl.remaining_at("fresh", 5, t0 + Duration::from_secs(295)), 4);
    }

    #[test]
    fn zero_window_is_clamped() {
        assert_eq!(RateLimiter::new(Duration::ZERO).window(), Duration::from_secs(1));
    }
}
