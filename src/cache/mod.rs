pub mod keys;
pub mod ttl_cache;

pub use ttl_cache::{CacheStats, TtlCache, DEFAULT_TTL};
