//! Core admin authentication for beefd
//!
//! This crate provides:
//! - Constant-time admin password verification
//! - Issuing and verifying signed, expiring session tokens

mod auth;

pub use auth::*;
