//! Segment cache: a `DashMap`-backed LRU bounded by byte size, with TTL and
//! single-flight fetch coalescing, grounded on the teacher's
//! `SegmentCache` (`src/streaming/segment_cache.rs`) generalized from an
//! entry-count bound to a byte-size bound per the size cap this spec uses.

pub mod prefetch;

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::OnceCell;
use vaultcast_common::{Result, VideoId};

pub use prefetch::Prefetcher;

/// Cache key: one segment (or subtitle track) of one video.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub video_id: VideoId,
    pub ordinal: u32,
}

impl CacheKey {
    pub fn new(video_id: VideoId, ordinal: u32) -> Self {
        Self { video_id, ordinal }
    }
}

struct CacheEntry {
    bytes: Bytes,
    media_type: String,
    byte_size: u64,
    last_accessed: Instant,
    inserted_at: Instant,
}

/// Read-only observability counters, per spec.md §4.3.
#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub evictions: AtomicU64,
    pub bytes_served: AtomicU64,
    pub prefetch_successes: AtomicU64,
    pub prefetch_failures: AtomicU64,
}

#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub bytes_served: u64,
    pub current_size: u64,
    pub current_entry_count: u64,
    pub prefetch_successes: u64,
    pub prefetch_failures: u64,
}

/// Bounded-byte LRU with TTL and single-flight fetch coalescing.
pub struct SegmentCache {
    entries: DashMap<CacheKey, CacheEntry>,
    inflight: DashMap<CacheKey, Arc<OnceCell<(Bytes, String)>>>,
    max_bytes: u64,
    ttl: Duration,
    used_bytes: AtomicU64,
    stats: CacheStats,
}

impl SegmentCache {
    pub fn new(max_bytes: u64, ttl_secs: u64) -> Self {
        Self {
            entries: DashMap::new(),
            inflight: DashMap::new(),
            max_bytes,
            ttl: Duration::from_secs(ttl_secs),
            used_bytes: AtomicU64::new(0),
            stats: CacheStats::default(),
        }
    }

    /// Return whether `key` is already present (and fresh) without touching
    /// LRU order — used by the prefetcher to skip no-op jobs.
    pub fn contains_fresh(&self, key: &CacheKey) -> bool {
        self.entries
            .get(key)
            .map(|e| e.inserted_at.elapsed() < self.ttl)
            .unwrap_or(false)
    }

    pub fn is_in_flight(&self, key: &CacheKey) -> bool {
        self.inflight.contains_key(key)
    }

    /// Return cached bytes if present and fresh, else drive exactly one
    /// underlying `fetch` for this key (all other concurrent callers for the
    /// same key await the same result) and populate the cache on success.
    pub async fn get_or_fetch<F, Fut>(&self, key: CacheKey, fetch: F) -> Result<(Bytes, String)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(Bytes, String)>>,
    {
        if let Some(mut entry) = self.entries.get_mut(&key) {
            if entry.inserted_at.elapsed() < self.ttl {
                entry.last_accessed = Instant::now();
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                self.stats
                    .bytes_served
                    .fetch_add(entry.byte_size, Ordering::Relaxed);
                return Ok((entry.bytes.clone(), entry.media_type.clone()));
            }
        }
        self.stats.misses.fetch_add(1, Ordering::Relaxed);

        let cell = self
            .inflight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let result = cell.get_or_try_init(fetch).await.map(|v| v.clone());
        self.inflight.remove(&key);

        let (bytes, media_type) = result?;
        self.stats
            .bytes_served
            .fetch_add(bytes.len() as u64, Ordering::Relaxed);
        self.insert(key, bytes.clone(), media_type.clone());
        Ok((bytes, media_type))
    }

    fn insert(&self, key: CacheKey, bytes: Bytes, media_type: String) {
        let byte_size = bytes.len() as u64;
        self.evict_until_fits(byte_size);

        let entry = CacheEntry {
            bytes,
            media_type,
            byte_size,
            last_accessed: Instant::now(),
            inserted_at: Instant::now(),
        };
        if let Some(old) = self.entries.insert(key, entry) {
            self.used_bytes.fetch_sub(old.byte_size, Ordering::Relaxed);
        }
        self.used_bytes.fetch_add(byte_size, Ordering::Relaxed);
    }

    fn evict_until_fits(&self, incoming: u64) {
        while self.used_bytes.load(Ordering::Relaxed) + incoming > self.max_bytes {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|e| e.last_accessed)
                .map(|e| e.key().clone());
            match oldest {
                Some(key) => {
                    if let Some((_, entry)) = self.entries.remove(&key) {
                        self.used_bytes.fetch_sub(entry.byte_size, Ordering::Relaxed);
                        self.stats.evictions.fetch_add(1, Ordering::Relaxed);
                    }
                }
                None => break,
            }
        }
    }

    /// Remove entries past their TTL; called periodically by a background task.
    pub fn cleanup_expired(&self) {
        let ttl = self.ttl;
        let mut removed_bytes = 0u64;
        let mut removed = 0u64;
        self.entries.retain(|_, entry| {
            let fresh = entry.inserted_at.elapsed() < ttl;
            if !fresh {
                removed_bytes += entry.byte_size;
                removed += 1;
            }
            fresh
        });
        if removed > 0 {
            self.used_bytes.fetch_sub(removed_bytes, Ordering::Relaxed);
            self.stats.evictions.fetch_add(removed, Ordering::Relaxed);
        }
    }

    pub fn clear(&self) {
        self.entries.clear();
        self.used_bytes.store(0, Ordering::Relaxed);
    }

    pub fn record_prefetch_result(&self, ok: bool) {
        if ok {
            self.stats.prefetch_successes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats.prefetch_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
            bytes_served: self.stats.bytes_served.load(Ordering::Relaxed),
            current_size: self.used_bytes.load(Ordering::Relaxed),
            current_entry_count: self.entries.len() as u64,
            prefetch_successes: self.stats.prefetch_successes.load(Ordering::Relaxed),
            prefetch_failures: self.stats.prefetch_failures.load(Ordering::Relaxed),
        }
    }
}

/// Periodic TTL sweep, modeled on the teacher's `start_cleanup_task`.
pub fn start_cleanup_task(cache: Arc<SegmentCache>, interval_secs: u64) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            cache.cleanup_expired();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn key(n: u32) -> CacheKey {
        CacheKey::new(VideoId::new("sample"), n)
    }

    #[tokio::test]
    async fn caches_after_first_fetch() {
        let cache = SegmentCache::new(1024, 300);
        let calls = Arc::new(AtomicU32::new(0));

        for _ in 0..3 {
            let calls = calls.clone();
            let (bytes, media_type) = cache
                .get_or_fetch(key(0), || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok((Bytes::from_static(b"hello"), "video/MP2T".to_string()))
                })
                .await
                .unwrap();
            assert_eq!(bytes.as_ref(), b"hello");
            assert_eq!(media_type, "video/MP2T");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().hits, 2);
    }

    #[tokio::test]
    async fn single_flight_coalesces_concurrent_callers() {
        let cache = Arc::new(SegmentCache::new(1024, 300));
        let calls = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_fetch(key(0), || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok((Bytes::from_static(b"data"), "video/MP2T".to_string()))
                    })
                    .await
                    .unwrap()
            }));
        }

        let mut results = Vec::new();
        for h in handles {
            results.push(h.await.unwrap());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|(b, _)| b.as_ref() == b"data"));
    }

    #[tokio::test]
    async fn evicts_oldest_when_over_budget() {
        let cache = SegmentCache::new(10, 300);
        cache
            .get_or_fetch(key(0), || async { Ok((Bytes::from_static(b"12345"), "t".into())) })
            .await
            .unwrap();
        cache
            .get_or_fetch(key(1), || async { Ok((Bytes::from_static(b"12345"), "t".into())) })
            .await
            .unwrap();
        cache
            .get_or_fetch(key(2), || async { Ok((Bytes::from_static(b"12345"), "t".into())) })
            .await
            .unwrap();

        assert!(cache.stats().current_size <= 10);
        assert_eq!(cache.stats().evictions, 1);
    }
}
