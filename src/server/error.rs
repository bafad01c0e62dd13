//! Maps [`vaultcast_common::Error`] to the JSON error body described in
//! spec.md §7: `{"error": "<kind>", "detail": "..."}` plus a status code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use vaultcast_common::Error;

pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::AccountUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::FetchTimeout(_) | Error::FetchFailed(_) | Error::UploadFailed(_) => StatusCode::BAD_GATEWAY,
            Error::PlanOversize { .. } | Error::TranscodeFailed(_) | Error::ProbeFailed(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Error::ConfigInvalid(_) | Error::Database(_) | Error::Io(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Error::IntegrityViolation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = ErrorBody { error: self.0.kind(), detail: self.0.to_string() };
        (status, Json(body)).into_response()
    }
}
