//! End-to-end scenarios per spec.md §8: ingest-then-play, playlist
//! stability, delete idempotence, and account-outage isolation, run
//! against a real router (via `tower::ServiceExt::oneshot`) and an
//! in-process mock of the remote attachment platform.

mod common;

use std::sync::Arc;

use http_body_util::BodyExt;
use tower::ServiceExt;
use vaultcast::config::Config;
use vaultcast::server::{build_coordinator, create_router};
use vaultcast_blob::AccountConfig;
use vaultcast_common::{AccountId, VideoId};
use vaultcast_db::pool::init_memory_pool;
use vaultcast_transcode::TranscoderDriver;

use common::{spawn_mock_platform, FakeDriver};

fn test_config(accounts: Vec<AccountConfig>) -> Config {
    let mut config = Config::default();
    config.accounts = accounts;
    config.segments.max_segment_bytes = 1_000_000;
    config
}

async fn write_fixture() -> tempfile::NamedTempFile {
    let file = tempfile::Builder::new().suffix(".mp4").tempfile().unwrap();
    tokio::fs::write(file.path(), vec![0u8; 1024]).await.unwrap();
    file
}

#[tokio::test]
async fn ingest_then_play_round_trips_segment_bytes() {
    let base_url = spawn_mock_platform().await;
    let config = test_config(vec![AccountConfig {
        id: AccountId::new("acct-0"),
        credential: "tok".to_string(),
        destination_id: base_url,
    }]);

    let db = init_memory_pool().unwrap();
    let driver: Arc<dyn TranscoderDriver> = Arc::new(FakeDriver { segment_count: 4, segment_bytes: 256 });
    let (coordinator, blob, accounts, state) = build_coordinator(&config, db.clone(), driver);

    let fixture = write_fixture().await;
    let video_id = coordinator.ingest(fixture.path(), "sample.mp4").await.unwrap();

    let cache = Arc::new(vaultcast::cache::SegmentCache::new(config.cache.cache_size, config.cache.cache_ttl));
    let segment_source = Arc::new(vaultcast::server::routes_hls::CatalogSegmentSource::new(db.clone(), blob.clone()));
    let prefetcher = Arc::new(vaultcast::cache::Prefetcher::new(
        cache.clone(),
        segment_source.clone(),
        config.cache.max_concurrent_preloads as usize,
        config.cache.preload_segments,
        tokio_util::sync::CancellationToken::new(),
    ));

    let ctx = vaultcast::server::AppContext {
        db,
        config: Arc::new(config),
        state,
        coordinator,
        cache,
        prefetcher,
        segment_source,
        blob,
        accounts,
    };
    let app = create_router(ctx);

    for ordinal in 0..4u8 {
        let uri = format!("/hls/{video_id}/video/{:05}.ts", ordinal);
        let response = app
            .clone()
            .oneshot(axum::http::Request::builder().uri(uri).body(axum::body::Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body.as_ref(), vec![ordinal; 256].as_slice());
    }
}

#[tokio::test]
async fn media_playlist_is_byte_identical_across_requests() {
    let base_url = spawn_mock_platform().await;
    let config = test_config(vec![AccountConfig {
        id: AccountId::new("acct-0"),
        credential: "tok".to_string(),
        destination_id: base_url,
    }]);

    let db = init_memory_pool().unwrap();
    let driver: Arc<dyn TranscoderDriver> = Arc::new(FakeDriver { segment_count: 3, segment_bytes: 128 });
    let (coordinator, blob, accounts, state) = build_coordinator(&config, db.clone(), driver);

    let fixture = write_fixture().await;
    let video_id = coordinator.ingest(fixture.path(), "sample.mp4").await.unwrap();

    let cache = Arc::new(vaultcast::cache::SegmentCache::new(config.cache.cache_size, config.cache.cache_ttl));
    let segment_source = Arc::new(vaultcast::server::routes_hls::CatalogSegmentSource::new(db.clone(), blob.clone()));
    let prefetcher = Arc::new(vaultcast::cache::Prefetcher::new(
        cache.clone(),
        segment_source.clone(),
        config.cache.max_concurrent_preloads as usize,
        config.cache.preload_segments,
        tokio_util::sync::CancellationToken::new(),
    ));
    let ctx = vaultcast::server::AppContext {
        db,
        config: Arc::new(config),
        state,
        coordinator,
        cache,
        prefetcher,
        segment_source,
        blob,
        accounts,
    };
    let app = create_router(ctx);

    let fetch_playlist = |app: axum::Router| {
        let uri = format!("/hls/{video_id}/video/playlist.m3u8");
        async move {
            let response = app
                .oneshot(axum::http::Request::builder().uri(uri).body(axum::body::Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), axum::http::StatusCode::OK);
            response.into_body().collect().await.unwrap().to_bytes()
        }
    };

    let first = fetch_playlist(app.clone()).await;
    let second = fetch_playlist(app).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn delete_is_idempotent_at_the_http_layer() {
    let base_url = spawn_mock_platform().await;
    let config = test_config(vec![AccountConfig {
        id: AccountId::new("acct-0"),
        credential: "tok".to_string(),
        destination_id: base_url,
    }]);

    let db = init_memory_pool().unwrap();
    let driver: Arc<dyn TranscoderDriver> = Arc::new(FakeDriver { segment_count: 2, segment_bytes: 64 });
    let (coordinator, blob, accounts, state) = build_coordinator(&config, db.clone(), driver);

    let fixture = write_fixture().await;
    let video_id = coordinator.ingest(fixture.path(), "sample.mp4").await.unwrap();

    let cache = Arc::new(vaultcast::cache::SegmentCache::new(config.cache.cache_size, config.cache.cache_ttl));
    let segment_source = Arc::new(vaultcast::server::routes_hls::CatalogSegmentSource::new(db.clone(), blob.clone()));
    let prefetcher = Arc::new(vaultcast::cache::Prefetcher::new(
        cache.clone(),
        segment_source.clone(),
        config.cache.max_concurrent_preloads as usize,
        config.cache.preload_segments,
        tokio_util::sync::CancellationToken::new(),
    ));
    let ctx = vaultcast::server::AppContext {
        db: db.clone(),
        config: Arc::new(config),
        state,
        coordinator,
        cache,
        prefetcher,
        segment_source,
        blob,
        accounts,
    };
    let app = create_router(ctx);

    let delete_uri = format!("/api/videos/{video_id}");
    let first = app
        .clone()
        .oneshot(
            axum::http::Request::builder()
                .method("DELETE")
                .uri(&delete_uri)
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(first.status(), axum::http::StatusCode::OK);

    let second = app
        .clone()
        .oneshot(
            axum::http::Request::builder()
                .method("DELETE")
                .uri(&delete_uri)
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(second.status(), axum::http::StatusCode::NOT_FOUND);

    let master_uri = format!("/hls/{video_id}/master.m3u8");
    let playback = app
        .oneshot(axum::http::Request::builder().uri(master_uri).body(axum::body::Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(playback.status(), axum::http::StatusCode::NOT_FOUND);

    let conn = vaultcast_db::pool::get_conn(&db).unwrap();
    assert!(vaultcast_db::queries::segments::list(&conn, &VideoId::new(video_id.to_string())).unwrap().is_empty());
}

#[tokio::test]
async fn account_outage_surfaces_as_unavailable_without_touching_other_accounts() {
    // Only one account is configured, and it points at a closed port that
    // nothing is listening on, simulating an offline account. Assigning any
    // segment to it must surface ACCOUNT_UNAVAILABLE/fetch failure without
    // the distributor silently falling back to a different account.
    let config = test_config(vec![AccountConfig {
        id: AccountId::new("acct-offline"),
        credential: "tok".to_string(),
        destination_id: "http://127.0.0.1:1".to_string(),
    }]);

    let db = init_memory_pool().unwrap();
    let driver: Arc<dyn TranscoderDriver> = Arc::new(FakeDriver { segment_count: 1, segment_bytes: 64 });
    let (coordinator, ..) = build_coordinator(&config, db, driver);

    let fixture = write_fixture().await;
    let result = coordinator.ingest(fixture.path(), "sample.mp4").await;
    assert!(result.is_err(), "ingest against an offline account must not silently succeed");
}

#[tokio::test]
async fn deleting_a_nonexistent_video_returns_404() {
    let config = test_config(vec![]);
    let db = init_memory_pool().unwrap();
    let driver: Arc<dyn TranscoderDriver> = Arc::new(FakeDriver { segment_count: 1, segment_bytes: 64 });
    let (coordinator, blob, accounts, state) = build_coordinator(&config, db.clone(), driver);

    let cache = Arc::new(vaultcast::cache::SegmentCache::new(config.cache.cache_size, config.cache.cache_ttl));
    let segment_source = Arc::new(vaultcast::server::routes_hls::CatalogSegmentSource::new(db.clone(), blob.clone()));
    let prefetcher = Arc::new(vaultcast::cache::Prefetcher::new(
        cache.clone(),
        segment_source.clone(),
        config.cache.max_concurrent_preloads as usize,
        config.cache.preload_segments,
        tokio_util::sync::CancellationToken::new(),
    ));
    let ctx = vaultcast::server::AppContext {
        db,
        config: Arc::new(config),
        state,
        coordinator,
        cache,
        prefetcher,
        segment_source,
        blob,
        accounts,
    };
    let app = create_router(ctx);

    let response = app
        .oneshot(
            axum::http::Request::builder()
                .method("DELETE")
                .uri("/api/videos/does-not-exist")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::NOT_FOUND);
}
