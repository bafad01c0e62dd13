//! `/api/system` — cache observability and the manual-clear escape hatch.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};

use super::AppContext;
use crate::cache::CacheStatsSnapshot;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/system/cache/stats", get(cache_stats))
        .route("/system/cache/clear", post(cache_clear))
}

/// Read-only cache counters per spec.md §4.3: hits, misses, evictions,
/// bytes served, current size/count, prefetch successes/failures.
#[utoipa::path(get, path = "/api/system/cache/stats", tag = "system", responses((status = 200, body = CacheStatsSnapshot)))]
pub async fn cache_stats(State(ctx): State<AppContext>) -> Json<CacheStatsSnapshot> {
    Json(ctx.cache.stats())
}

/// Drops all cache entries (but leaves in-flight single-flight fetches to
/// complete and populate a fresh entry).
#[utoipa::path(post, path = "/api/system/cache/clear", tag = "system", responses((status = 204)))]
pub async fn cache_clear(State(ctx): State<AppContext>) -> StatusCode {
    ctx.cache.clear();
    ctx.state.notify_cache_cleared();
    StatusCode::NO_CONTENT
}
