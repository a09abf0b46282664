//! Protocol types for beefd's HTTP API
//!
//! This crate defines:
//! - The incident record stored by the service
//! - Request and response bodies for every endpoint
//! - Validation and sanitization of admin input

mod types;
mod validation;

pub use types::*;
pub use validation::*;
