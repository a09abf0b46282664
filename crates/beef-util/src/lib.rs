//! Shared utilities for beefd
//!
//! This crate provides:
//! - Record ID type (MissId) and generation
//! - Time utilities (wall clock with mock support, monotonic time, injectable clocks)
//! - Login rate limiting

mod ids;
mod rate_limit;
mod time;

pub use ids::*;
pub use rate_limit::*;
pub use time::*;
