//! Branch Cache: LRU + TTL + session scoping.

pub mod branch_cache;
pub mod fingerprint;

pub use branch_cache::{BranchCache, CacheEntry, CacheLookup};
