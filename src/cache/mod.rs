//! Cache module for storing API responses in memory
//!
//! This module provides a TTL cache that holds API responses in memory with
//! configurable per-category TTL values, plus deterministic derivation of
//! cache keys from request parameters. The cache lives for the process
//! lifetime only; nothing is persisted to disk.

mod key;
mod store;

pub use key::derive_key;
pub use store::{CacheCategory, CacheConfig, CacheStats, TtlCache};
