//! Login attempt rate limiting
//!
//! Per-client fixed window with lockout escalation. State lives in process
//! memory only, so a horizontally scaled deployment gets per-instance limits.

use std::collections::HashMap;
use std::time::Duration;

use crate::MonotonicInstant;

/// Limits applied to login attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginLimits {
    /// Attempts allowed per window
    pub max_attempts: u32,
    /// Window length for a fresh client
    pub window: Duration,
    /// Window length once `max_attempts` has been reached
    pub lockout: Duration,
}

impl Default for LoginLimits {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window: Duration::from_secs(15 * 60),
            lockout: Duration::from_secs(30 * 60),
        }
    }
}

/// Outcome of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Attempts left in the current window
    pub remaining: u32,
    /// Seconds until the window resets, rounded up
    pub reset_in_secs: u64,
}

#[derive(Debug)]
struct AttemptWindow {
    count: u32,
    reset_at: MonotonicInstant,
}

/// Sliding-window limiter for admin login attempts
#[derive(Debug)]
pub struct LoginRateLimiter {
    limits: LoginLimits,
    clients: HashMap<String, AttemptWindow>,
}

impl LoginRateLimiter {
    pub fn new(limits: LoginLimits) -> Self {
        Self {
            limits,
            clients: HashMap::new(),
        }
    }

    /// Check whether `client` may attempt a login, consuming one attempt if so
    pub fn check_and_consume(&mut self, client: &str) -> RateLimitDecision {
        self.check_and_consume_at(client, MonotonicInstant::now())
    }

    pub fn check_and_consume_at(&mut self, client: &str, now: MonotonicInstant) -> RateLimitDecision {
        let max = self.limits.max_attempts;

        if let Some(window) = self.clients.get_mut(client)
            && now <= window.reset_at
        {
            if window.count >= max {
                return RateLimitDecision {
                    allowed: false,
                    remaining: 0,
                    reset_in_secs: ceil_secs(window.reset_at.saturating_duration_until(now)),
                };
            }

            window.count += 1;

            // Reaching the cap escalates to a lockout measured from this attempt
            if window.count >= max {
                window.reset_at = now + self.limits.lockout;
            }

            return RateLimitDecision {
                allowed: true,
                remaining: max.saturating_sub(window.count),
                reset_in_secs: ceil_secs(window.reset_at.saturating_duration_until(now)),
            };
        }

        self.clients.insert(
            client.to_string(),
            AttemptWindow {
                count: 1,
                reset_at: now + self.limits.window,
            },
        );

        RateLimitDecision {
            allowed: true,
            remaining: max.saturating_sub(1),
            reset_in_secs: ceil_secs(self.limits.window),
        }
    }

    /// Forget a client's attempts (after a successful login)
    pub fn reset(&mut self, client: &str) {
        self.clients.remove(client);
    }

    /// Drop expired entries, returning how many were removed
    pub fn sweep(&mut self) -> usize {
        self.sweep_at(MonotonicInstant::now())
    }

    pub fn sweep_at(&mut self, now: MonotonicInstant) -> usize {
        let before = self.clients.len();
        self.clients.retain(|_, window| now <= window.reset_at);
        before - self.clients.len()
    }

    /// Number of tracked clients
    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new(LoginLimits::default())
    }
}

fn ceil_secs(d: Duration) -> u64 {
    u64::try_from(d.as_millis().div_ceil(1000)).unwrap_or(u64::MAX)
}
