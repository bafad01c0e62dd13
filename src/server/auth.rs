//! Single-operator-key admin auth, gating only the mutating `/api/*` routes
//! (`/hls/*` stays open — playback has no auth in this spec).

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;

use super::AppContext;

pub async fn api_auth_middleware(
    State(ctx): State<AppContext>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = ctx.config.server.auth.api_key.as_deref() else {
        return Ok(next.run(req).await);
    };

    let presented = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match presented {
        Some(token) if token == expected => Ok(next.run(req).await),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_prefix_stripped_correctly() {
        let header = "Bearer secret-key";
        assert_eq!(header.strip_prefix("Bearer "), Some("secret-key"));
    }
}
