//! In-memory TTL cache for API responses
//!
//! Provides a `TtlCache` that stores serializable values with per-entry
//! expiry, a global size cap, and hit/miss accounting. Entries are swept
//! lazily on every write; eviction removes the oldest-written entries first
//! (write-time ordering, not access recency).

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Fraction of an entry's TTL after which a background refresh is due
const REFRESH_THRESHOLD: f64 = 0.8;

/// Categories of cached data, each with its own TTL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheCategory {
    /// Long-lived hot data (Troy saga events)
    Hot,
    /// Character detail lookups
    Character,
    /// Everything else
    Default,
}

/// Cache-wide configuration, set once at startup
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries before oldest-written eviction kicks in
    pub max_entries: usize,
    /// TTL applied when a category has no override
    pub default_ttl: Duration,
    /// Per-category TTL overrides
    pub category_ttls: HashMap<CacheCategory, Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let mut category_ttls = HashMap::new();
        category_ttls.insert(CacheCategory::Hot, Duration::from_secs(15 * 60));
        category_ttls.insert(CacheCategory::Character, Duration::from_secs(10 * 60));

        Self {
            max_entries: 100,
            default_ttl: Duration::from_secs(5 * 60),
            category_ttls,
        }
    }
}

impl CacheConfig {
    /// Returns the TTL applicable to entries of the given category
    pub fn ttl_for(&self, category: CacheCategory) -> Duration {
        self.category_ttls
            .get(&category)
            .copied()
            .unwrap_or(self.default_ttl)
    }
}

/// A single cached value with its expiry bookkeeping
#[derive(Debug, Clone)]
struct CacheEntry {
    data: Value,
    written_at: DateTime<Utc>,
    ttl: Duration,
    key: String,
    category: CacheCategory,
    /// Monotonic write counter; decides eviction order among entries
    /// written within the same timestamp tick
    seq: u64,
}

impl CacheEntry {
    fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.written_at).to_std().unwrap_or(Duration::ZERO)
    }

    fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.age(now) < self.ttl
    }
}

/// Point-in-time cache statistics snapshot
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Number of entries currently held (including not-yet-swept expired ones)
    pub total_entries: usize,
    /// Rough memory footprint of keys plus serialized values, in bytes
    pub estimated_memory_bytes: usize,
    /// Percentage of requests served from cache, 0 when no requests yet
    pub hit_rate_percent: f64,
    /// Percentage of requests that missed, 0 when no requests yet
    pub miss_rate_percent: f64,
    /// Whether a valid hot-category entry is present
    pub hot_data_cached: bool,
    /// When the hot dataset was last written, if ever
    pub last_hot_update: Option<DateTime<Utc>>,
}

struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    config: CacheConfig,
    hits: u64,
    misses: u64,
    next_seq: u64,
}

/// Process-wide TTL cache, shared by reference between the foreground
/// request path and the background refresh task.
///
/// All state sits behind an internal mutex so a single instance can be
/// handed out as `Arc<TtlCache>`. Tests construct isolated instances with
/// their own configs rather than touching a global.
pub struct TtlCache {
    inner: Mutex<CacheInner>,
}

impl Default for TtlCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TtlCache {
    /// Creates a cache with the default configuration
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    /// Creates a cache with a custom configuration
    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                config,
                hits: 0,
                misses: 0,
                next_seq: 0,
            }),
        }
    }

    fn locked(&self) -> MutexGuard<'_, CacheInner> {
        // A poisoned lock only means a panic elsewhere; the map itself is
        // still structurally sound, so keep serving.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replaces the active configuration
    pub fn configure(&self, config: CacheConfig) {
        let mut inner = self.locked();
        debug!(max_entries = config.max_entries, "cache configured");
        inner.config = config;
    }

    /// Stores a value under `key` with the TTL configured for `category`
    pub fn set<T: Serialize>(&self, key: &str, data: &T, category: CacheCategory) {
        let ttl = self.locked().config.ttl_for(category);
        self.set_with_ttl(key, data, category, ttl);
    }

    /// Stores a value with an explicit TTL, overriding the category default
    pub fn set_with_ttl<T: Serialize>(
        &self,
        key: &str,
        data: &T,
        category: CacheCategory,
        ttl: Duration,
    ) {
        let data = match serde_json::to_value(data) {
            Ok(value) => value,
            Err(err) => {
                warn!(key, %err, "value could not be serialized, not caching");
                return;
            }
        };

        let mut inner = self.locked();
        let now = Utc::now();
        let seq = inner.next_seq;
        inner.next_seq += 1;

        inner.entries.insert(
            key.to_string(),
            CacheEntry {
                data,
                written_at: now,
                ttl,
                key: key.to_string(),
                category,
                seq,
            },
        );
        debug!(key, ttl_ms = ttl.as_millis() as u64, "cached entry");

        sweep_expired(&mut inner, now);
        enforce_size_limit(&mut inner);
    }

    /// Retrieves a value if present and unexpired.
    ///
    /// An expired entry is deleted on the spot and counted as a miss.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut inner = self.locked();
        let now = Utc::now();

        let found = inner
            .entries
            .get(key)
            .map(|entry| (entry.is_valid(now), entry.data.clone()));

        match found {
            None => {
                inner.misses += 1;
                None
            }
            Some((false, _)) => {
                inner.entries.remove(key);
                inner.misses += 1;
                debug!(key, "cache entry expired");
                None
            }
            Some((true, data)) => match serde_json::from_value(data) {
                Ok(value) => {
                    inner.hits += 1;
                    debug!(key, "cache hit");
                    Some(value)
                }
                Err(err) => {
                    warn!(key, %err, "cached value failed to decode, dropping entry");
                    inner.entries.remove(key);
                    inner.misses += 1;
                    None
                }
            },
        }
    }

    /// Deletes every entry whose key contains `pattern`; returns the count removed
    pub fn invalidate(&self, pattern: &str) -> usize {
        let mut inner = self.locked();
        let before = inner.entries.len();
        inner.entries.retain(|key, _| !key.contains(pattern));
        let removed = before - inner.entries.len();
        debug!(pattern, removed, "invalidated cache entries");
        removed
    }

    /// Deletes all entries and resets hit/miss counters
    #[allow(dead_code)]
    pub fn clear(&self) {
        let mut inner = self.locked();
        let removed = inner.entries.len();
        inner.entries.clear();
        inner.hits = 0;
        inner.misses = 0;
        debug!(removed, "cleared cache");
    }

    /// Returns true when `key` is absent or its age has crossed 80% of its
    /// TTL, i.e. the entry should be proactively refreshed.
    pub fn refresh_due(&self, key: &str) -> bool {
        let inner = self.locked();
        let now = Utc::now();

        match inner.entries.get(key) {
            None => true,
            Some(entry) => {
                entry.age(now).as_secs_f64() >= entry.ttl.as_secs_f64() * REFRESH_THRESHOLD
            }
        }
    }

    /// Takes a point-in-time statistics snapshot
    pub fn stats(&self) -> CacheStats {
        let inner = self.locked();
        let now = Utc::now();

        let total_requests = inner.hits + inner.misses;
        let (hit_rate_percent, miss_rate_percent) = if total_requests > 0 {
            let hit = inner.hits as f64 / total_requests as f64 * 100.0;
            let miss = inner.misses as f64 / total_requests as f64 * 100.0;
            (round2(hit), round2(miss))
        } else {
            (0.0, 0.0)
        };

        let estimated_memory_bytes = inner
            .entries
            .values()
            .map(|entry| entry.key.len() + entry.data.to_string().len())
            .sum();

        let hot_data_cached = inner
            .entries
            .values()
            .any(|entry| entry.category == CacheCategory::Hot && entry.is_valid(now));
        let last_hot_update = inner
            .entries
            .values()
            .filter(|entry| entry.category == CacheCategory::Hot)
            .map(|entry| entry.written_at)
            .max();

        CacheStats {
            total_entries: inner.entries.len(),
            estimated_memory_bytes,
            hit_rate_percent,
            miss_rate_percent,
            hot_data_cached,
            last_hot_update,
        }
    }

    /// One-line human-readable cache status, for diagnostics output
    pub fn status_summary(&self) -> String {
        let stats = self.stats();
        let memory_mb = stats.estimated_memory_bytes as f64 / (1024.0 * 1024.0);
        format!(
            "Cache: {} entries, {:.2}MB, {:.1}% hit rate, hot data: {}",
            stats.total_entries,
            memory_mb,
            stats.hit_rate_percent,
            if stats.hot_data_cached { "yes" } else { "no" }
        )
    }
}

/// Removes expired entries; runs opportunistically on every write
fn sweep_expired(inner: &mut CacheInner, now: DateTime<Utc>) {
    let before = inner.entries.len();
    inner.entries.retain(|_, entry| entry.is_valid(now));
    let removed = before - inner.entries.len();
    if removed > 0 {
        debug!(removed, "swept expired cache entries");
    }
}

/// Evicts the oldest-written entries once the size cap is exceeded
fn enforce_size_limit(inner: &mut CacheInner) {
    if inner.entries.len() <= inner.config.max_entries {
        return;
    }

    let mut by_write_order: Vec<(u64, String)> = inner
        .entries
        .values()
        .map(|entry| (entry.seq, entry.key.clone()))
        .collect();
    by_write_order.sort_unstable();

    let excess = inner.entries.len() - inner.config.max_entries;
    for (_, key) in by_write_order.into_iter().take(excess) {
        inner.entries.remove(&key);
    }
    debug!(removed = excess, "enforced cache size limit");
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
