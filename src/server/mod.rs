use crate::cache::prefetch::Prefetcher;
use crate::cache::{start_cleanup_task, SegmentCache};
use crate::config::Config;
use crate::coordinator::Coordinator;
use crate::distributor::Distributor;
use crate::state::AppState;
use anyhow::{Context, Result};
use axum::{
    http::{header, Method, StatusCode},
    middleware,
    response::IntoResponse,
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use vaultcast_blob::{AccountList, RemoteBlobClient};
use vaultcast_db::pool::DbPool;
use vaultcast_transcode::{FfmpegDriver, TranscoderDriver};

pub mod auth;
pub mod error;
pub mod openapi;
pub mod routes_hls;
pub mod routes_system;
pub mod routes_upload;
pub mod routes_videos;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Shared application context, built once in [`start_server`] and cloned
/// (cheaply — every field is an `Arc`/pool handle) into every handler.
#[derive(Clone)]
pub struct AppContext {
    pub db: DbPool,
    pub config: Arc<Config>,
    pub state: Arc<AppState>,
    pub coordinator: Arc<Coordinator>,
    pub cache: Arc<SegmentCache>,
    pub prefetcher: Arc<Prefetcher>,
    pub segment_source: Arc<routes_hls::CatalogSegmentSource>,
    pub blob: Arc<RemoteBlobClient>,
    pub accounts: Arc<AccountList>,
}

pub fn create_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let app = Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes(&ctx))
        .nest("/api", openapi::openapi_routes())
        .merge(routes_hls::routes());

    app.layer(cors).layer(TraceLayer::new_for_http()).with_state(ctx)
}

/// `/hls/*` stays unauthenticated — playback has no auth in this design.
/// Only the mutating catalog/upload/system routes under `/api` are gated.
fn api_routes(ctx: &AppContext) -> Router<AppContext> {
    let protected = routes_videos::routes()
        .merge(routes_upload::routes())
        .merge(routes_system::routes());

    if ctx.config.server.auth.enabled {
        protected.layer(middleware::from_fn_with_state(ctx.clone(), auth::api_auth_middleware))
    } else {
        protected
    }
}

async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

/// Build the full dependency graph and serve until shutdown. `driver` is
/// injectable so tests (and, in principle, a hardware-accel variant) can
/// supply a non-ffmpeg [`TranscoderDriver`]; `start_server` always uses
/// [`FfmpegDriver`].
pub async fn start_server(config: Config, db: DbPool) -> Result<()> {
    let driver: Arc<dyn TranscoderDriver> = Arc::new(FfmpegDriver::new());
    run_server(config, db, driver).await
}

/// Build the shared (coordinator, blob client, account list, app state)
/// graph. Shared between the HTTP server and the CLI's `upload`/`delete`/
/// `test-bots` subcommands, which exercise the same ingest/delete paths
/// without binding a listener.
pub fn build_coordinator(
    config: &Config,
    db: DbPool,
    driver: Arc<dyn TranscoderDriver>,
) -> (Arc<Coordinator>, Arc<RemoteBlobClient>, Arc<AccountList>, Arc<AppState>) {
    let accounts = Arc::new(AccountList::new(config.accounts.clone()));
    let blob = Arc::new(RemoteBlobClient::new(
        (*accounts).clone(),
        config.upload.requests_per_second,
        config.upload.upload_retries,
    ));
    let state = AppState::new();

    let distributor = Arc::new(Distributor::new(
        blob.clone(),
        accounts.clone(),
        db.clone(),
        config.upload.upload_concurrency as usize,
        config.upload.upload_retries,
    ));

    let coordinator = Arc::new(Coordinator::new(
        db,
        driver,
        distributor,
        accounts.clone(),
        blob.clone(),
        state.clone(),
        config.segments.clone(),
    ));

    (coordinator, blob, accounts, state)
}

pub async fn run_server(config: Config, db: DbPool, driver: Arc<dyn TranscoderDriver>) -> Result<()> {
    let config = Arc::new(config);
    let (coordinator, blob, accounts, state) = build_coordinator(&config, db.clone(), driver);

    let resumed = coordinator.resume_pending().await?;
    if resumed > 0 {
        tracing::warn!(count = resumed, "marked interrupted ingests as error on startup");
    }

    let cache = Arc::new(SegmentCache::new(config.cache.cache_size, config.cache.cache_ttl));
    start_cleanup_task(cache.clone(), config.cache.cache_ttl.max(1));

    let prefetch_cancel = CancellationToken::new();
    let segment_source = Arc::new(routes_hls::CatalogSegmentSource::new(db.clone(), blob.clone()));
    let prefetcher = Arc::new(Prefetcher::new(
        cache.clone(),
        segment_source.clone(),
        config.cache.max_concurrent_preloads as usize,
        config.cache.preload_segments,
        prefetch_cancel.clone(),
    ));

    let ctx = AppContext {
        db,
        config: config.clone(),
        state,
        coordinator,
        cache,
        prefetcher,
        segment_source,
        blob,
        accounts,
    };

    let addr: SocketAddr = format!("{}:{}", config.server.local_host, config.server.local_port)
        .parse()
        .context("invalid server bind address")?;

    let app = create_router(ctx);

    tracing::info!(%addr, "starting vaultcast server");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Run the server in its own task so the shutdown grace period (§5: stop
    // accepting, drain in-flight requests, then forcibly abort) can be
    // enforced from the outside with a timeout rather than blocking forever
    // on however long draining takes.
    let (shutdown_tx, mut shutdown_rx) = tokio::sync::watch::channel(false);
    let serve = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.changed().await;
            })
            .await
    });

    shutdown_signal().await;
    prefetch_cancel.cancel();
    let _ = shutdown_tx.send(true);

    match tokio::time::timeout(SHUTDOWN_GRACE, serve).await {
        Ok(Ok(Ok(()))) => tracing::info!("server shutdown complete"),
        Ok(Ok(Err(err))) => tracing::error!(error = %err, "server exited with error"),
        Ok(Err(err)) => tracing::error!(error = %err, "server task panicked"),
        Err(_) => tracing::warn!(grace_secs = SHUTDOWN_GRACE.as_secs(), "grace period elapsed, forcing shutdown"),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, draining in-flight requests");
}
