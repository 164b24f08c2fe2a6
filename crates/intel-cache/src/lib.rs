//! In-memory response cache for market intelligence
//!
//! Entries are keyed by `SUBJECT:analysis_date:VARIANT` and expire after a TTL
//! drawn uniformly from `[min_ttl, max_ttl)` on every write, so entries written
//! together do not all expire together. Expired entries are dropped lazily on
//! read and by a sweep that runs every `sweep_every`-th insertion.
//!
//! There is no request coalescing: two concurrent misses for the same key both
//! go upstream and the later `set` wins.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;

pub mod clock;

pub use clock::{Clock, ManualClock, SystemClock};

const DEFAULT_MIN_TTL_SECS: u64 = 15 * 60;
const DEFAULT_MAX_TTL_SECS: u64 = 30 * 60;
const DEFAULT_SWEEP_EVERY: usize = 100;

/// Internal cache entry with creation and expiry timestamps
struct CacheEntry<T> {
    data: T,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Lower TTL bound (inclusive)
    pub min_ttl: std::time::Duration,
    /// Upper TTL bound (exclusive). A value `<= min_ttl` makes the TTL fixed at `min_ttl`.
    pub max_ttl: std::time::Duration,
    /// Sweep expired entries whenever the store size is a multiple of this. 0 disables.
    pub sweep_every: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            min_ttl: std::time::Duration::from_secs(DEFAULT_MIN_TTL_SECS),
            max_ttl: std::time::Duration::from_secs(DEFAULT_MAX_TTL_SECS),
            sweep_every: DEFAULT_SWEEP_EVERY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
}

pub struct ResponseCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> ResponseCache<V> {
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    pub fn with_config(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            config,
            clock,
        }
    }

    /// Subject and variant are case-folded; the date is used verbatim.
    pub fn cache_key(subject: &str, analysis_date: &str, profile_variant: &str) -> String {
        format!(
            "{}:{}:{}",
            subject.to_uppercase(),
            analysis_date,
            profile_variant.to_uppercase()
        )
    }

    /// Get a cached value. Misses and expired entries both return `None`;
    /// an expired entry is removed.
    pub fn get(&self, subject: &str, analysis_date: &str, profile_variant: &str) -> Option<V> {
        let key = Self::cache_key(subject, analysis_date, profile_variant);
        let now = self.clock.now();

        match self.entries.get(&key) {
            None => return None,
            Some(entry) if !entry.is_expired(now) => return Some(entry.data.clone()),
            Some(_) => {}
        }

        // Re-checked under the shard write lock so a concurrent fresh `set` survives
        if self
            .entries
            .remove_if(&key, |_, entry| entry.is_expired(now))
            .is_some()
        {
            tracing::debug!("Intel cache entry expired: {}", key);
        }
        None
    }

    /// Store a value with a freshly randomized TTL, replacing any previous entry.
    pub fn set(&self, subject: &str, analysis_date: &str, profile_variant: &str, value: V) {
        let key = Self::cache_key(subject, analysis_date, profile_variant);
        let now = self.clock.now();
        let ttl = self.random_ttl();

        self.entries.insert(
            key,
            CacheEntry {
                data: value,
                created_at: now,
                expires_at: now + ttl,
            },
        );

        let sweep_every = self.config.sweep_every;
        if sweep_every > 0 && self.entries.len() % sweep_every == 0 {
            self.sweep_expired();
        }
    }

    /// Remove every expired entry, returning how many were dropped.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            tracing::debug!("Intel cache sweep removed {} expired entries", removed);
        }
        removed
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Partition entries into valid and expired without evicting anything.
    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let (mut valid_entries, mut expired_entries) = (0, 0);

        for entry in self.entries.iter() {
            if entry.value().is_expired(now) {
                expired_entries += 1;
            } else {
                valid_entries += 1;
            }
        }

        CacheStats {
            total_entries: valid_entries + expired_entries,
            valid_entries,
            expired_entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Age of an entry, regardless of expiry
    pub fn entry_age(
        &self,
        subject: &str,
        analysis_date: &str,
        profile_variant: &str,
    ) -> Option<Duration> {
        let key = Self::cache_key(subject, analysis_date, profile_variant);
        let now = self.clock.now();
        self.entries.get(&key).map(|entry| now - entry.created_at)
    }

    fn random_ttl(&self) -> Duration {
        let min_ms = self.config.min_ttl.as_millis() as u64;
        let max_ms = self.config.max_ttl.as_millis() as u64;

        let ttl_ms = if max_ms > min_ms {
            rand::thread_rng().gen_range(min_ms..max_ms)
        } else {
            min_ms
        };

        Duration::milliseconds(ttl_ms as i64)
    }
}

impl<V: Clone> Default for ResponseCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::{json, Value};
    use std::collections::HashSet;

    fn manual_cache<V: Clone>() -> (ResponseCache<V>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).unwrap(),
        ));
        let cache = ResponseCache::with_clock(CacheConfig::default(), clock.clone());
        (cache, clock)
    }

    #[test]
    fn test_miss_then_hit() {
        let cache: ResponseCache<String> = ResponseCache::new();
        assert_eq!(cache.get("AAPL", "2024-01-01", "MODERATE"), None);

        cache.set("AAPL", "2024-01-01", "MODERATE", "analysis".to_string());
        assert_eq!(
            cache.get("AAPL", "2024-01-01", "MODERATE"),
            Some("analysis".to_string())
        );
    }

    #[test]
    fn test_key_is_case_insensitive() {
        let cache: ResponseCache<u32> = ResponseCache::new();
        cache.set("aapl", "2024-01-01", "moderate", 7);

        assert_eq!(cache.get("AAPL", "2024-01-01", "MODERATE"), Some(7));
        assert_eq!(cache.get("aapl", "2024-01-01", "moderate"), Some(7));
        assert_eq!(cache.len(), 1);
        assert_eq!(
            ResponseCache::<u32>::cache_key("aapl", "2024-01-01", "moderate"),
            "AAPL:2024-01-01:MODERATE"
        );
    }

    #[test]
    fn test_date_and_variant_are_part_of_key() {
        let cache: ResponseCache<u32> = ResponseCache::new();
        cache.set("AAPL", "2024-01-01", "LOW", 1);

        assert_eq!(cache.get("AAPL", "2024-01-02", "LOW"), None);
        assert_eq!(cache.get("AAPL", "2024-01-01", "HIGH"), None);
    }

    #[test]
    fn test_expired_entry_is_removed_on_get() {
        let (cache, clock) = manual_cache::<u32>();
        cache.set("INFY", "2024-06-01", "LOW", 1);

        // still valid at the lower TTL bound
        clock.advance(Duration::minutes(15));
        assert_eq!(cache.get("INFY", "2024-06-01", "LOW"), Some(1));

        clock.advance(Duration::minutes(15) + Duration::milliseconds(1));
        assert_eq!(cache.get("INFY", "2024-06-01", "LOW"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_ttl_within_bounds_and_randomized() {
        let (cache, _clock) = manual_cache::<u32>();

        for i in 0..1000 {
            cache.set(&format!("SYM{}", i), "2024-06-01", "MODERATE", i);
        }

        let mut offsets = HashSet::new();
        for entry in cache.entries.iter() {
            let ttl = entry.expires_at - entry.created_at;
            assert!(ttl >= Duration::minutes(15), "TTL below bound: {}", ttl);
            assert!(ttl < Duration::minutes(30), "TTL above bound: {}", ttl);
            offsets.insert(ttl.num_milliseconds());
        }
        assert!(offsets.len() > 1, "TTLs should not all be identical");
    }

    #[test]
    fn test_overwrite_replaces_value_and_timestamps() {
        let (cache, clock) = manual_cache::<u32>();
        cache.set("TCS", "2024-06-01", "HIGH", 1);

        clock.advance(Duration::minutes(10));
        cache.set("TCS", "2024-06-01", "HIGH", 2);

        assert_eq!(cache.get("TCS", "2024-06-01", "HIGH"), Some(2));
        assert_eq!(
            cache.entry_age("TCS", "2024-06-01", "HIGH"),
            Some(Duration::zero())
        );

        // new TTL counts from the overwrite
        clock.advance(Duration::minutes(14));
        assert_eq!(cache.get("TCS", "2024-06-01", "HIGH"), Some(2));
    }

    #[test]
    fn test_sweep_runs_every_hundredth_insert() {
        let (cache, clock) = manual_cache::<usize>();

        for i in 0..99 {
            cache.set(&format!("OLD{}", i), "2024-06-01", "LOW", i);
        }
        clock.advance(Duration::minutes(31));
        assert_eq!(cache.len(), 99);

        // 100th entry triggers the sweep
        cache.set("FRESH", "2024-06-01", "LOW", 100);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("FRESH", "2024-06-01", "LOW"), Some(100));
    }

    #[test]
    fn test_stats_do_not_evict() {
        let (cache, clock) = manual_cache::<u32>();
        cache.set("WIPRO", "2024-06-01", "LOW", 1);
        clock.advance(Duration::minutes(31));
        cache.set("HCL", "2024-06-01", "LOW", 2);

        let stats = cache.stats();
        assert_eq!(
            stats,
            CacheStats {
                total_entries: 2,
                valid_entries: 1,
                expired_entries: 1
            }
        );
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_tcs_scenario() {
        let cache: ResponseCache<Value> = ResponseCache::new();
        let record = json!({ "sentiment": { "score": 0.7, "label": "bullish" } });

        cache.set("TCS", "2024-06-01", "MODERATE", record.clone());
        assert_eq!(cache.get("tcs", "2024-06-01", "moderate"), Some(record));

        let stats = cache.stats();
        assert_eq!(stats.valid_entries, 1);
        assert_eq!(stats.expired_entries, 0);
    }

    #[test]
    fn test_clear() {
        let cache: ResponseCache<u32> = ResponseCache::new();
        cache.set("A", "2024-06-01", "LOW", 1);
        cache.set("B", "2024-06-01", "LOW", 2);
        cache.clear();

        assert!(cache.is_empty());
        assert_eq!(cache.stats().total_entries, 0);
    }

    #[test]
    fn test_degenerate_ttl_range_is_fixed() {
        let clock = Arc::new(ManualClock::default());
        let config = CacheConfig {
            min_ttl: std::time::Duration::from_secs(60),
            max_ttl: std::time::Duration::from_secs(60),
            sweep_every: 0,
        };
        let cache = ResponseCache::with_clock(config, clock.clone());
        cache.set("A", "2024-06-01", "LOW", 1u32);

        clock.advance(Duration::seconds(60));
        assert_eq!(cache.get("A", "2024-06-01", "LOW"), Some(1));
        clock.advance(Duration::milliseconds(1));
        assert_eq!(cache.get("A", "2024-06-01", "LOW"), None);
    }

    #[test]
    fn test_concurrent_access() {
        let cache: ResponseCache<usize> = ResponseCache::new();

        std::thread::scope(|s| {
            for t in 0..8 {
                let cache = &cache;
                s.spawn(move || {
                    for i in 0..250 {
                        let subject = format!("T{}S{}", t, i % 50);
                        cache.set(&subject, "2024-06-01", "MODERATE", i);
                        assert!(cache.get(&subject, "2024-06-01", "moderate").is_some());
                    }
                });
            }
        });

        assert_eq!(cache.len(), 8 * 50);
        assert_eq!(cache.stats().valid_entries, 8 * 50);
    }
}
