//! Caching primitives for read-only lookups
//!
//! Provides a TTL cache that coalesces identical in-flight requests so
//! search-as-you-type does not hammer the API.

mod request_cache;
mod search;

pub use request_cache::{CacheStats, RequestCache};
pub use search::CachedSearch;
