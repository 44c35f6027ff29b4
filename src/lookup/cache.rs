//! TTL'd LRU cache for point lookups.
//!
//! The cache key is derived from the rounded coordinates plus the layer
//! filter, so any parameter change is a cache miss. Entries carry their
//! insertion instant; a hit past the TTL counts as a miss and is evicted.
//! Negative results (`None`) are cached like positive ones.

use lru::LruCache;
use parking_lot::RwLock;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use xxhash_rust::xxh64::Xxh64;

use crate::types::BoundaryLevel;

use super::LookupHit;

/// Configuration for the point cache.
#[derive(Debug, Clone)]
pub struct PointCacheConfig {
    /// Maximum number of entries.
    pub max_entries: usize,
    /// Entry time-to-live.
    pub ttl: Duration,
    /// Decimal places coordinates are rounded to for the key.
    pub precision: u32,
    /// Whether the cache is enabled at all.
    pub enabled: bool,
}

impl Default for PointCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl: Duration::from_secs(300),
            precision: 6,
            enabled: true,
        }
    }
}

/// Cache key over all parameters that affect a lookup result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PointCacheKey(u64);

impl PointCacheKey {
    fn compute(lat: f64, lon: f64, level: Option<BoundaryLevel>, precision: u32) -> Self {
        use std::hash::Hasher as _;
        let scale = 10_f64.powi(precision as i32);
        let lat_q = (lat * scale).round() as i64;
        let lon_q = (lon * scale).round() as i64;
        let mut hasher = Xxh64::new(0);
        hasher.write(&lat_q.to_le_bytes());
        hasher.write(&lon_q.to_le_bytes());
        match level {
            Some(level) => hasher.write(format!("{level}").as_bytes()),
            None => hasher.write(b"*"),
        }
        Self(hasher.finish())
    }
}

struct CacheEntry {
    result: Option<LookupHit>,
    inserted_at: Instant,
}

/// Thread-safe TTL'd LRU cache of lookup results.
pub struct PointCache {
    config: PointCacheConfig,
    inner: Option<RwLock<LruCache<PointCacheKey, CacheEntry>>>,
}

impl PointCache {
    /// Create a cache from its configuration.
    pub fn new(config: PointCacheConfig) -> Self {
        let inner = config.enabled.then(|| {
            let cap = NonZeroUsize::new(config.max_entries)
                .unwrap_or_else(|| NonZeroUsize::new(1_000).expect("non-zero literal"));
            RwLock::new(LruCache::new(cap))
        });
        Self { config, inner }
    }

    /// Fetch a cached result. `Some(None)` means "cached negative".
    pub fn get(
        &self,
        lat: f64,
        lon: f64,
        level: Option<BoundaryLevel>,
    ) -> Option<Option<LookupHit>> {
        let inner = self.inner.as_ref()?;
        let key = PointCacheKey::compute(lat, lon, level, self.config.precision);

        let mut cache = inner.write();
        match cache.get(&key) {
            Some(entry) if entry.inserted_at.elapsed() <= self.config.ttl => {
                Some(entry.result.clone())
            }
            Some(_) => {
                // Expired: evict so the slot is reusable immediately.
                cache.pop(&key);
                None
            }
            None => None,
        }
    }

    /// Insert a result (evicting the LRU entry at capacity).
    pub fn put(&self, lat: f64, lon: f64, level: Option<BoundaryLevel>, result: Option<LookupHit>) {
        let Some(inner) = self.inner.as_ref() else { return };
        let key = PointCacheKey::compute(lat, lon, level, self.config.precision);
        inner.write().put(
            key,
            CacheEntry {
                result,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drop every entry.
    pub fn clear(&self) {
        if let Some(inner) = self.inner.as_ref() {
            inner.write().clear();
        }
    }

    /// Current entry count.
    pub fn len(&self) -> usize {
        self.inner.as_ref().map_or(0, |c| c.read().len())
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: &str) -> Option<LookupHit> {
        Some(LookupHit {
            id: id.to_string(),
            name: format!("District {id}"),
            level: BoundaryLevel::District,
        })
    }

    #[test]
    fn test_put_get_roundtrip() {
        let cache = PointCache::new(PointCacheConfig::default());
        cache.put(43.25, -89.75, None, hit("5501"));
        let cached = cache.get(43.25, -89.75, None).unwrap();
        assert_eq!(cached.unwrap().id, "5501");
    }

    #[test]
    fn test_rounding_collapses_nearby_points() {
        let cache = PointCache::new(PointCacheConfig::default());
        cache.put(43.2500001, -89.75, None, hit("5501"));
        // Within 1e-6 of the stored point: same key.
        assert!(cache.get(43.2500004, -89.75, None).is_some());
        // A meaningfully different point: different key.
        assert!(cache.get(43.26, -89.75, None).is_none());
    }

    #[test]
    fn test_layer_filter_partitions_keys() {
        let cache = PointCache::new(PointCacheConfig::default());
        cache.put(43.25, -89.75, None, hit("5501"));
        assert!(cache.get(43.25, -89.75, Some(BoundaryLevel::County)).is_none());
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = PointCache::new(PointCacheConfig {
            ttl: Duration::from_millis(0),
            ..Default::default()
        });
        cache.put(43.25, -89.75, None, hit("5501"));
        std::thread::sleep(Duration::from_millis(2));
        assert!(cache.get(43.25, -89.75, None).is_none());
        // Expired entry was evicted.
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_negative_result_cached() {
        let cache = PointCache::new(PointCacheConfig::default());
        cache.put(10.0, 10.0, None, None);
        let cached = cache.get(10.0, 10.0, None);
        assert_eq!(cached, Some(None));
    }

    #[test]
    fn test_lru_eviction_at_capacity() {
        let cache = PointCache::new(PointCacheConfig {
            max_entries: 2,
            ..Default::default()
        });
        cache.put(1.0, 1.0, None, hit("a"));
        cache.put(2.0, 2.0, None, hit("b"));
        cache.put(3.0, 3.0, None, hit("c"));
        assert_eq!(cache.len(), 2);
        assert!(cache.get(1.0, 1.0, None).is_none());
    }

    #[test]
    fn test_disabled_cache_is_inert() {
        let cache = PointCache::new(PointCacheConfig {
            enabled: false,
            ..Default::default()
        });
        cache.put(1.0, 1.0, None, hit("a"));
        assert!(cache.get(1.0, 1.0, None).is_none());
        assert_eq!(cache.len(), 0);
    }
}
