//! Persistence layer for beefd
//!
//! Provides:
//! - A four-operation key-value trait with in-memory and REST backends
//! - A TTL-based mutual-exclusion lock built on conditional set
//! - The incident record store (one JSON list under a single key)

mod kv;
mod lock;
mod memory;
mod misses;
mod rest;

pub use kv::*;
pub use lock::*;
pub use memory::*;
pub use misses::*;
pub use rest::*;

use thiserror::Error;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Failed to acquire lock after {attempts} attempts")]
    LockUnavailable { attempts: u32 },

    #[error("Maximum record limit ({max}) reached. Delete some records first.")]
    RecordLimit { max: usize },
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
