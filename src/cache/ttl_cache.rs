use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Default time-to-live for cached query results.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// A cached value with the moment it was stored and how long it stays fresh.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    timestamp: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.timestamp) >= self.ttl
    }
}

/// Snapshot of cache contents.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    pub size: usize,
    pub keys: Vec<String>,
    /// Hits over lookups since creation or the last `clear`.
    pub hit_rate: f64,
}

/// Thread-safe expiring cache for remote query results
///
/// Entries expire lazily: a lookup that finds a stale entry evicts it and
/// reports a miss. Capacity is bounded with LRU eviction so a long run
/// cannot grow the cache without limit.
pub struct TtlCache<V> {
    cache: Mutex<LruCache<String, CacheEntry<V>>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone> TtlCache<V> {
    /// Create a cache holding at most `capacity` entries, each fresh for `ttl`.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);

        Self {
            cache: Mutex::new(LruCache::new(cap)),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a fresh value; stale entries are evicted and count as a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut cache = self.cache.lock().unwrap();
        let now = Instant::now();

        let lookup = cache
            .get(key)
            .map(|entry| (!entry.is_expired(now)).then(|| entry.value.clone()));
        let fresh = match lookup {
            Some(Some(value)) => Some(value),
            Some(None) => {
                cache.pop(key);
                None
            }
            None => None,
        };

        match fresh {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        fresh
    }

    /// Store a value under `key`, replacing any previous entry.
    pub fn set(&self, key: impl Into<String>, value: V) {
        let entry = CacheEntry {
            value,
            timestamp: Instant::now(),
            ttl: self.ttl,
        };
        self.cache.lock().unwrap().put(key.into(), entry);
    }

    pub fn len(&self) -> usize {
        self.cache.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.lock().unwrap().is_empty()
    }

    /// Drop every entry and reset the hit counters.
    pub fn clear(&self) {
        self.cache.lock().unwrap().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        log::debug!("Query cache cleared");
    }

    /// Current size, keys (most recently used first) and hit rate.
    pub fn stats(&self) -> CacheStats {
        let hit_rate = self.hit_rate();
        let cache = self.cache.lock().unwrap();
        CacheStats {
            size: cache.len(),
            keys: cache.iter().map(|(k, _)| k.clone()).collect(),
            hit_rate,
        }
    }

    /// (hits, misses) since creation or the last `clear`.
    pub fn counters(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }

    /// Fraction of lookups served from the cache; 0.0 before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let (hits, misses) = self.counters();
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_cache_set_and_get() {
        let cache = TtlCache::new(10, DEFAULT_TTL);
        cache.set("relationships:AF-1", vec![1, 2, 3]);

        assert_eq!(cache.get("relationships:AF-1"), Some(vec![1, 2, 3]));
        assert_eq!(cache.ttl(), DEFAULT_TTL);
    }

    #[test]
    fn test_cache_miss() {
        let cache: TtlCache<Vec<u8>> = TtlCache::new(10, DEFAULT_TTL);
        assert!(cache.get("nonexistent").is_none());
        assert_eq!(cache.counters(), (0, 1));
    }

    #[test]
    fn test_expired_entry_is_evicted_on_lookup() {
        let cache = TtlCache::new(10, Duration::from_millis(20));
        cache.set("k", "v".to_string());
        assert_eq!(cache.len(), 1);

        sleep(Duration::from_millis(40));

        assert!(cache.get("k").is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_set_refreshes_timestamp() {
        let cache = TtlCache::new(10, Duration::from_millis(60));
        cache.set("k", 1);
        sleep(Duration::from_millis(40));
        cache.set("k", 2);
        sleep(Duration::from_millis(40));

        assert_eq!(cache.get("k"), Some(2));
    }

    #[test]
    fn test_hit_rate() {
        let cache = TtlCache::new(10, DEFAULT_TTL);
        assert_eq!(cache.hit_rate(), 0.0);

        cache.set("a", 1);
        let _ = cache.get("a");
        let _ = cache.get("a");
        let _ = cache.get("a");
        let _ = cache.get("b");

        assert!((cache.hit_rate() - 0.75).abs() < f64::EPSILON);
        assert!((cache.stats().hit_rate - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_clear_and_stats() {
        let cache = TtlCache::new(10, DEFAULT_TTL);
        cache.set("a", 1);
        cache.set("b", 2);

        let stats = cache.stats();
        assert_eq!(stats.size, 2);
        assert!(stats.keys.contains(&"a".to_string()));
        assert!(stats.keys.contains(&"b".to_string()));

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats().size, 0);
        assert_eq!(cache.counters(), (0, 0));
        assert_eq!(cache.stats().hit_rate, 0.0);
    }

    #[test]
    fn test_capacity_bound_evicts_least_recent() {
        let cache = TtlCache::new(2, DEFAULT_TTL);
        cache.set("a", 1);
        cache.set("b", 2);
        let _ = cache.get("a");
        cache.set("c", 3);

        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
    }
}
