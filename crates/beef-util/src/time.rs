//! Time utilities for beefd
//!
//! Provides wall-clock time (for record timestamps, date checks and session
//! tokens), monotonic time (for rate-limit windows), and the [`Clock`] trait
//! used wherever code needs to sleep or read the time in a testable way.
//!
//! # Mock Time for Development
//!
//! In debug builds, the `BEEF_MOCK_TIME` environment variable can be set
//! to override the system time for all time-sensitive operations. This is useful
//! for checking future-date rejection and session expiry by hand.
//!
//! Format: `YYYY-MM-DD HH:MM:SS` in UTC (e.g., `2025-12-25 14:30:00`)
//!
//! Example:
//! ```bash
//! BEEF_MOCK_TIME="2025-12-25 14:30:00" cargo run -p beefd
//! ```

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant};

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "BEEF_MOCK_TIME";

/// Format accepted by [`MOCK_TIME_ENV_VAR`]
pub const MOCK_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Offset between the mock time and the real time at first use, so mock
/// time keeps ticking.
static MOCK_TIME_OFFSET: OnceLock<Option<chrono::Duration>> = OnceLock::new();

/// Parse a [`MOCK_TIME_FORMAT`] timestamp as UTC
pub fn parse_mock_time(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value.trim(), MOCK_TIME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

fn mock_time_offset() -> Option<chrono::Duration> {
    *MOCK_TIME_OFFSET.get_or_init(|| {
        if !cfg!(debug_assertions) {
            return None;
        }

        let value = std::env::var(MOCK_TIME_ENV_VAR).ok()?;
        let Some(mock_now) = parse_mock_time(&value) else {
            tracing::warn!(
                value = %value,
                expected_format = MOCK_TIME_FORMAT,
                "Ignoring unparseable mock time"
            );
            return None;
        };

        let offset = mock_now.signed_duration_since(Utc::now());
        tracing::info!(mock_now = %mock_now, offset_secs = offset.num_seconds(), "Mock time enabled");
        Some(offset)
    })
}

/// Whether `BEEF_MOCK_TIME` is shifting the wall clock
pub fn is_mock_time_active() -> bool {
    mock_time_offset().is_some()
}

/// Current UTC time, shifted by mock time in debug builds
pub fn now() -> DateTime<Utc> {
    match mock_time_offset() {
        Some(offset) => Utc::now() + offset,
        None => Utc::now(),
    }
}

/// Current time as Unix epoch milliseconds
pub fn now_millis() -> i64 {
    now().timestamp_millis()
}

/// Represents a point in monotonic time for rate-limit windows.
/// This is immune to wall-clock changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MonotonicInstant(Instant);

impl MonotonicInstant {
    pub fn now() -> Self {
        Self(Instant::now())
    }

    /// Returns duration until `self`, or zero if `self` is in the past
    pub fn saturating_duration_until(&self, from: MonotonicInstant) -> Duration {
        if self.0 > from.0 {
            self.0.duration_since(from.0)
        } else {
            Duration::ZERO
        }
    }
}

/// Span used in place of a deadline that `Instant` cannot represent
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

impl std::ops::Add<Duration> for MonotonicInstant {
    type Output = MonotonicInstant;

    /// Saturates instead of panicking when `rhs` is out of range
    fn add(self, rhs: Duration) -> Self::Output {
        let deadline = self
            .0
            .checked_add(rhs)
            .or_else(|| self.0.checked_add(rhs.min(FAR_FUTURE)))
            .unwrap_or(self.0);
        MonotonicInstant(deadline)
    }
}

/// Source of wall-clock time and sleeping.
///
/// Production code uses [`SystemClock`]; tests use [`ManualClock`] so that
/// retry backoff and expiry checks run without real delays.
#[async_trait]
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current time as Unix epoch milliseconds
    fn now_millis(&self) -> i64;

    /// Suspend the caller for `duration`
    async fn sleep(&self, duration: Duration);
}

/// Real time, backed by [`now_millis`] and `tokio::time::sleep`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        now_millis()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Manually driven clock for tests.
///
/// `sleep` returns immediately, advances the clock by the requested
/// duration and records it.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicI64,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new(start_millis: i64) -> Self {
        Self {
            millis: AtomicI64::new(start_millis),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn advance(&self, duration: Duration) {
        self.millis
            .fetch_add(duration.as_millis() as i64, Ordering::SeqCst);
    }

    /// Durations passed to `sleep`, in call order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }

    async fn sleep(&self, duration: Duration) {
        if let Ok(mut sleeps) = self.sleeps.lock() {
            sleeps.push(duration);
        }
        self.advance(duration);
    }
}
