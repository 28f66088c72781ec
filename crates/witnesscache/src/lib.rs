//! # witnesscache
//!
//! Write-back LRU cache for precomputed coin witness data.
//!
//! ## Architecture
//! - **Hot tier**: AHash index into an arena-backed recency list (O(1))
//! - **Dirty tier**: AHash map of evicted entries awaiting a flush
//! - **Flush**: drains the dirty tier into a [`WitnessWriter`], then
//!   rewrites every hot entry without evicting it

#![warn(missing_docs)]

mod cache;
mod config;
mod lru;
mod stats;
mod writer;

pub use cache::PrecomputeCache;
pub use config::{CacheConfig, DEFAULT_CAPACITY};
pub use precomputedb::Hash256;
pub use stats::CacheStats;
pub use writer::{FlushSummary, WitnessWriter};
