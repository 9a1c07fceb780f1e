//! Snapshot Cache Layer
//!
//! Holds the last generated commodity snapshot in process memory so repeated
//! requests inside the freshness window are served without regenerating.
//!
//! # Architecture
//! ```text
//! Request → Check slot → Fresh? → Return (cached: true)
//!              ↓
//!           Stale/empty → Simulator ─ok──→ Store → Return (cached: false)
//!                             │
//!                           error → Fallback ─ok──→ Store → Return (cached: false)
//!                                      │
//!                                    error → Err (slot untouched)
//! ```
//!
//! # Cache Strategy
//! - One slot for the whole snapshot, replaced atomically
//! - Freshness window: 10 minutes by default
//! - No persistence, the slot dies with the process

use crate::{
    clock::Clock,
    error::Result,
    fallback::FallbackModel,
    price_simulator::SnapshotGenerator,
    types::Snapshot,
};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

/// Default freshness window in seconds
const DEFAULT_FRESHNESS_SECONDS: i64 = 600;

/// Contents of the cache slot
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub data: Arc<Snapshot>,
    pub written_at: DateTime<Utc>,
}

/// Single-slot, time-boxed snapshot cache
#[derive(Debug)]
pub struct SnapshotCache {
    entry: Option<CacheEntry>,

    /// Age below which the entry is served as-is
    freshness: Duration,

    hits: u64,
    misses: u64,
    fallbacks: u64,
    failures: u64,
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self {
            entry: None,
            freshness: Duration::seconds(DEFAULT_FRESHNESS_SECONDS),
            hits: 0,
            misses: 0,
            fallbacks: 0,
            failures: 0,
        }
    }

    /// Set a custom freshness window
    ///
    /// # Example
    /// ```text
    /// SnapshotCache::new().with_freshness(Duration::seconds(30))
    /// ```
    pub fn with_freshness(mut self, freshness: Duration) -> Self {
        self.freshness = freshness;
        self
    }

    /// Return the cached snapshot if it is younger than the freshness window.
    ///
    /// Counts a hit or a miss.
    pub fn get_fresh(&mut self, now: DateTime<Utc>) -> Option<Arc<Snapshot>> {
        match &self.entry {
            Some(entry) if now - entry.written_at < self.freshness => {
                self.hits += 1;
                Some(Arc::clone(&entry.data))
            }
            _ => {
                self.misses += 1;
                None
            }
        }
    }

    /// Overwrite the slot with a complete snapshot.
    pub fn store(&mut self, snapshot: Snapshot, now: DateTime<Utc>) -> Arc<Snapshot> {
        let data = Arc::new(snapshot);
        self.entry = Some(CacheEntry {
            data: Arc::clone(&data),
            written_at: now,
        });
        data
    }

    /// Drop the cached snapshot so the next lookup regenerates.
    pub fn clear(&mut self) {
        self.entry = None;
        debug!("Cleared snapshot cache");
    }

    fn record_fallback(&mut self) {
        self.fallbacks += 1;
    }

    fn record_failure(&mut self) {
        self.failures += 1;
    }

    /// Counters and slot state as of `now`
    pub fn stats(&self, now: DateTime<Utc>) -> CacheStats {
        CacheStats {
            populated: self.entry.is_some(),
            age_seconds: self
                .entry
                .as_ref()
                .map(|entry| (now - entry.written_at).num_seconds()),
            source: self
                .entry
                .as_ref()
                .map(|entry| entry.data.source.to_string()),
            freshness_seconds: self.freshness.num_seconds(),
            hits: self.hits,
            misses: self.misses,
            fallbacks: self.fallbacks,
            failures: self.failures,
        }
    }
}

// ============================================================================
// SUPPORTING TYPES
// ============================================================================

/// Cache statistics
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CacheStats {
    /// Whether a snapshot is held
    pub populated: bool,

    /// Age of the held snapshot
    pub age_seconds: Option<i64>,

    /// Generation path of the held snapshot
    pub source: Option<String>,

    /// Freshness window in seconds
    pub freshness_seconds: i64,

    pub hits: u64,
    pub misses: u64,

    /// Regenerations that had to use the fallback model
    pub fallbacks: u64,

    /// Regenerations where both generators failed
    pub failures: u64,
}

/// Result of a cached lookup
#[derive(Debug, Clone)]
pub struct SnapshotLookup {
    pub data: Arc<Snapshot>,

    /// True when served from the slot without regenerating
    pub cached: bool,
}

// ============================================================================
// CACHED SNAPSHOT FETCHER (High-level wrapper)
// ============================================================================

/// Snapshot fetcher with automatic caching and fallback
///
/// The cache lock is held across check, regenerate and store, so concurrent
/// misses regenerate once and later callers see the stored snapshot.
pub struct CachedSnapshotFetcher {
    cache: Mutex<SnapshotCache>,
    primary: Arc<dyn SnapshotGenerator>,
    fallback: Arc<dyn SnapshotGenerator>,
    clock: Arc<dyn Clock>,
}

impl CachedSnapshotFetcher {
    /// Create a fetcher using `primary`, falling back to [`FallbackModel`].
    pub fn new(primary: Arc<dyn SnapshotGenerator>, clock: Arc<dyn Clock>) -> Self {
        Self {
            cache: Mutex::new(SnapshotCache::new()),
            primary,
            fallback: Arc::new(FallbackModel),
            clock,
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn SnapshotGenerator>) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_freshness(mut self, freshness: Duration) -> Self {
        self.cache.get_mut().freshness = freshness;
        self
    }

    /// Current time according to the fetcher's clock
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Get the current snapshot
    ///
    /// # How it works:
    /// 1. Fresh entry in the slot: return it, `cached: true`
    /// 2. Otherwise run the primary generator and store its snapshot
    /// 3. If the primary fails, run the fallback and store that instead
    /// 4. If both fail, return the fallback's error and leave the slot as it was
    pub async fn get_snapshot(&self) -> Result<SnapshotLookup> {
        let now = self.clock.now();
        let mut cache = self.cache.lock().await;

        if let Some(data) = cache.get_fresh(now) {
            debug!("Serving snapshot from cache (generated {})", data.timestamp);
            return Ok(SnapshotLookup { data, cached: true });
        }

        debug!("Snapshot cache miss, regenerating");
        let snapshot = match self.primary.generate(now).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Primary generator failed, using fallback: {}", e);
                cache.record_fallback();

                match self.fallback.generate(now).await {
                    Ok(snapshot) => snapshot,
                    Err(e) => {
                        error!("Fallback generator failed: {}", e);
                        cache.record_failure();
                        return Err(e);
                    }
                }
            }
        };

        let data = cache.store(snapshot, now);
        debug!("Cached snapshot from {}", data.source);

        Ok(SnapshotLookup {
            data,
            cached: false,
        })
    }

    /// Drop the cached snapshot
    pub async fn clear(&self) {
        self.cache.lock().await.clear();
    }

    /// Get cache statistics
    pub async fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        self.cache.lock().await.stats(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::ManualClock,
        error::CommodityError,
        price_simulator::MarketSimulator,
        types::{CommodityKey, SnapshotSource},
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const START_MS: i64 = 1_767_225_600_000; // 2026-01-01T00:00:00Z

    /// Generator that always fails and counts calls
    #[derive(Default)]
    struct FailingGenerator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SnapshotGenerator for FailingGenerator {
        async fn generate(&self, _now: DateTime<Utc>) -> Result<Snapshot> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(CommodityError::Generation("upstream unavailable".to_string()))
        }
    }

    fn fetcher_with(
        primary: Arc<dyn SnapshotGenerator>,
    ) -> (CachedSnapshotFetcher, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_millis(START_MS));
        let fetcher = CachedSnapshotFetcher::new(primary, clock.clone());
        (fetcher, clock)
    }

    #[test]
    fn test_slot_freshness_boundary() {
        let now = DateTime::<Utc>::UNIX_EPOCH + Duration::days(1);
        let mut cache = SnapshotCache::new().with_freshness(Duration::seconds(10));
        assert!(cache.get_fresh(now).is_none());

        let snapshot = FallbackModel.snapshot(now).unwrap();
        let stored = cache.store(snapshot, now);

        let hit = cache.get_fresh(now + Duration::milliseconds(9_999)).unwrap();
        assert!(Arc::ptr_eq(&stored, &hit));
        assert!(cache.get_fresh(now + Duration::seconds(10)).is_none());

        let stats = cache.stats(now + Duration::seconds(10));
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.age_seconds, Some(10));
        assert_eq!(stats.source.as_deref(), Some("fallback-simple"));
    }

    #[tokio::test]
    async fn test_second_call_within_window_is_cached() {
        let (fetcher, clock) = fetcher_with(Arc::new(MarketSimulator::seeded(3)));

        let first = fetcher.get_snapshot().await.unwrap();
        assert!(!first.cached);
        assert!(first.data.source.to_string().starts_with("enhanced-simulation-"));

        clock.advance(Duration::milliseconds(60_000));
        let second = fetcher.get_snapshot().await.unwrap();

        assert!(second.cached);
        assert!(Arc::ptr_eq(&first.data, &second.data));
        assert_eq!(first.data.timestamp, second.data.timestamp);
    }

    #[tokio::test]
    async fn test_expired_entry_is_regenerated() {
        let (fetcher, clock) = fetcher_with(Arc::new(MarketSimulator::seeded(3)));

        let first = fetcher.get_snapshot().await.unwrap();
        clock.advance(Duration::minutes(10));
        let second = fetcher.get_snapshot().await.unwrap();

        assert!(!second.cached);
        assert!(second.data.timestamp > first.data.timestamp);
    }

    #[tokio::test]
    async fn test_primary_failure_uses_fallback() {
        let failing = Arc::new(FailingGenerator::default());
        let (fetcher, clock) = fetcher_with(failing.clone());

        let lookup = fetcher.get_snapshot().await.unwrap();
        assert!(!lookup.cached);
        assert_eq!(lookup.data.source, SnapshotSource::Fallback);
        assert_eq!(lookup.data.commodities.len(), CommodityKey::ALL.len());
        for quote in lookup.data.commodities.values() {
            assert_eq!(quote.source, "fallback");
        }

        // Fallback output is cached like any other snapshot
        clock.advance(Duration::seconds(30));
        let again = fetcher.get_snapshot().await.unwrap();
        assert!(again.cached);
        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);

        let stats = fetcher.stats().await;
        assert_eq!(stats.fallbacks, 1);
        assert_eq!(stats.failures, 0);
    }

    #[tokio::test]
    async fn test_total_failure_leaves_slot_untouched() {
        let (fetcher, clock) = fetcher_with(Arc::new(MarketSimulator::seeded(5)));
        let fetcher = fetcher.with_fallback(Arc::new(FailingGenerator::default()));

        let first = fetcher.get_snapshot().await.unwrap();

        // Force the primary to fail from now on
        let fetcher = CachedSnapshotFetcher {
            primary: Arc::new(FailingGenerator::default()),
            ..fetcher
        };
        clock.advance(Duration::minutes(11));

        let result = fetcher.get_snapshot().await;
        assert!(matches!(result, Err(CommodityError::Generation(_))));

        let stats = fetcher.stats().await;
        assert!(stats.populated);
        assert_eq!(stats.source, Some(first.data.source.to_string()));
        assert_eq!(stats.failures, 1);
    }

    #[tokio::test]
    async fn test_concurrent_misses_regenerate_once() {
        let (fetcher, _clock) = fetcher_with(Arc::new(MarketSimulator::seeded(11)));
        let fetcher = Arc::new(fetcher);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let fetcher = Arc::clone(&fetcher);
                tokio::spawn(async move { fetcher.get_snapshot().await.unwrap() })
            })
            .collect();

        let mut fresh = 0;
        let mut first: Option<Arc<Snapshot>> = None;
        for handle in handles {
            let lookup = handle.await.unwrap();
            if !lookup.cached {
                fresh += 1;
            }
            match &first {
                Some(data) => assert!(Arc::ptr_eq(data, &lookup.data)),
                None => first = Some(lookup.data),
            }
        }
        assert_eq!(fresh, 1);
    }

    #[tokio::test]
    async fn test_clear_forces_regeneration() {
        let (fetcher, _clock) = fetcher_with(Arc::new(MarketSimulator::seeded(2)));

        fetcher.get_snapshot().await.unwrap();
        fetcher.clear().await;

        assert!(!fetcher.stats().await.populated);
        assert!(!fetcher.get_snapshot().await.unwrap().cached);
    }
}
