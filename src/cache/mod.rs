//! Response caching with LRU or unbounded retention.

pub mod response_cache;

pub use response_cache::{CachePolicy, CacheStats, ResponseCache, DEFAULT_CACHE_CAPACITY};
