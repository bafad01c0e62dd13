//! OpenAPI document and Swagger UI, mounted at `/api/docs`.

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::AppContext;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "vaultcast API",
        version = "0.1.0",
        description = "HLS catalog backed by remote attachment storage",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT"),
    ),
    servers((url = "/", description = "Default server")),
    paths(
        super::routes_videos::list_videos,
        super::routes_videos::get_video,
        super::routes_videos::delete_video,
        super::routes_upload::upload,
        super::routes_upload::upload_progress,
        super::routes_system::cache_stats,
        super::routes_system::cache_clear,
    ),
    components(schemas(
        super::routes_videos::VideoSummary,
        super::routes_videos::VideoDetail,
        super::routes_upload::UploadResponse,
        super::routes_upload::ProgressResponse,
        crate::cache::CacheStatsSnapshot,
    )),
    tags(
        (name = "videos", description = "Catalog video listing and deletion"),
        (name = "upload", description = "Ingest a local media file"),
        (name = "hls", description = "Playlist and segment delivery"),
        (name = "system", description = "Cache observability"),
    )
)]
pub struct ApiDoc;

/// `/docs` - Swagger UI, `/openapi.json` - raw spec.
pub fn openapi_routes() -> Router<AppContext> {
    Router::new().merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
}
