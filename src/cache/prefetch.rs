//! Bounded-concurrency segment prefetcher, modeled on the teacher's
//! `start_cleanup_task` background-loop idiom but driven by on-demand
//! scheduling rather than a fixed interval: each playlist fetch schedules
//! the next few ordinals instead of waiting for a timer.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use vaultcast_common::{Result, VideoId};

use super::{CacheKey, SegmentCache};

/// Fetches the bytes for one segment ordinal of one video. The coordinator
/// supplies the real implementation (database lookup + blob download); tests
/// supply a stub.
#[async_trait]
pub trait SegmentSource: Send + Sync {
    async fn fetch_segment(&self, video_id: &VideoId, ordinal: u32) -> Result<(Bytes, String)>;
}

/// Schedules background fetches of upcoming segments into a [`SegmentCache`],
/// bounded by a global concurrency permit so prefetching never starves
/// foreground playback requests.
pub struct Prefetcher {
    cache: Arc<SegmentCache>,
    source: Arc<dyn SegmentSource>,
    permits: Arc<Semaphore>,
    window: u32,
    cancel: CancellationToken,
}

impl Prefetcher {
    /// `cancel` is shared with the server's shutdown path: once cancelled,
    /// every in-flight and newly scheduled prefetch job stops immediately
    /// instead of running to completion.
    pub fn new(
        cache: Arc<SegmentCache>,
        source: Arc<dyn SegmentSource>,
        max_concurrent: usize,
        window: u32,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            cache,
            source,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            window,
            cancel,
        }
    }

    /// Enqueue background fetches for the `window` ordinals following
    /// `from_ordinal` (exclusive), stopping at `segment_count`. Never blocks
    /// the caller: each fetch runs on its own spawned task and acquires the
    /// shared semaphore before touching the cache or network.
    pub fn schedule(&self, video_id: VideoId, from_ordinal: u32, segment_count: u32) {
        let upper = (from_ordinal + 1 + self.window).min(segment_count);
        for ordinal in (from_ordinal + 1)..upper {
            let key = CacheKey::new(video_id.clone(), ordinal);
            if self.cache.contains_fresh(&key) || self.cache.is_in_flight(&key) {
                continue;
            }

            let cache = self.cache.clone();
            let source = self.source.clone();
            let permits = self.permits.clone();
            let video_id = video_id.clone();
            let cancel = self.cancel.clone();

            tokio::spawn(async move {
                let _permit = match permits.try_acquire_owned() {
                    Ok(permit) => permit,
                    Err(_) => {
                        debug!(%video_id, ordinal, "prefetch skipped: no free slot");
                        return;
                    }
                };

                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!(%video_id, ordinal, "prefetch cancelled at shutdown");
                    }
                    result = fetch_into_cache(&cache, &source, &video_id, ordinal) => {
                        match result {
                            Ok(()) => cache.record_prefetch_result(true),
                            Err(err) => {
                                warn!(%video_id, ordinal, error = %err, "prefetch failed");
                                cache.record_prefetch_result(false);
                            }
                        }
                    }
                }
            });
        }
    }
}

async fn fetch_into_cache(
    cache: &SegmentCache,
    source: &Arc<dyn SegmentSource>,
    video_id: &VideoId,
    ordinal: u32,
) -> Result<()> {
    let key = CacheKey::new(video_id.clone(), ordinal);
    let video_id = video_id.clone();
    let source = source.clone();
    let fetch_fn = move || fetch_once(source, video_id, ordinal);
    cache.get_or_fetch(key, fetch_fn).await.map(|_| ())
}

fn fetch_once(
    source: Arc<dyn SegmentSource>,
    video_id: VideoId,
    ordinal: u32,
) -> impl Future<Output = Result<(Bytes, String)>> {
    async move { source.fetch_segment(&video_id, ordinal).await }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct StubSource {
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl SegmentSource for StubSource {
        async fn fetch_segment(&self, _video_id: &VideoId, _ordinal: u32) -> Result<(Bytes, String)> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((Bytes::from_static(b"ts"), "video/MP2T".to_string()))
        }
    }

    /// Sleeps before resolving, so a pre-cancelled token deterministically
    /// wins the `select!` race in `cancelling_the_token_stops_scheduled_prefetches`.
    struct SlowSource;

    #[async_trait]
    impl SegmentSource for SlowSource {
        async fn fetch_segment(&self, _video_id: &VideoId, _ordinal: u32) -> Result<(Bytes, String)> {
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            Ok((Bytes::from_static(b"ts"), "video/MP2T".to_string()))
        }
    }

    #[tokio::test]
    async fn schedules_bounded_window_of_ordinals() {
        let cache = Arc::new(SegmentCache::new(1024 * 1024, 300));
        let calls = Arc::new(AtomicU32::new(0));
        let source = Arc::new(StubSource { calls: calls.clone() });
        let prefetcher = Prefetcher::new(cache.clone(), source, 4, 3, CancellationToken::new());

        prefetcher.schedule(VideoId::new("sample"), 0, 10);
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(cache.contains_fresh(&CacheKey::new(VideoId::new("sample"), 1)));
        assert!(!cache.contains_fresh(&CacheKey::new(VideoId::new("sample"), 4)));
    }

    #[tokio::test]
    async fn skips_already_cached_ordinals() {
        let cache = Arc::new(SegmentCache::new(1024 * 1024, 300));
        let calls = Arc::new(AtomicU32::new(0));
        let source = Arc::new(StubSource { calls: calls.clone() });

        cache
            .get_or_fetch(CacheKey::new(VideoId::new("sample"), 1), || async {
                Ok((Bytes::from_static(b"ts"), "video/MP2T".to_string()))
            })
            .await
            .unwrap();

        let prefetcher = Prefetcher::new(cache.clone(), source, 4, 2, CancellationToken::new());
        prefetcher.schedule(VideoId::new("sample"), 0, 10);
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancelling_the_token_stops_scheduled_prefetches() {
        let cache = Arc::new(SegmentCache::new(1024 * 1024, 300));
        let source = Arc::new(SlowSource);
        let cancel = CancellationToken::new();
        let prefetcher = Prefetcher::new(cache.clone(), source, 4, 3, cancel.clone());

        cancel.cancel();
        prefetcher.schedule(VideoId::new("sample"), 0, 10);
        tokio::time::sleep(std::time::Duration::from_millis(300)).await;

        assert!(!cache.contains_fresh(&CacheKey::new(VideoId::new("sample"), 1)));
    }
}
