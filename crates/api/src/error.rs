//! API error types and response mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use storefront_core::{CoreError, FieldErrors};
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("validation failed")]
    Validation(FieldErrors),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("upstream store failure: {0}")]
    Upstream(String),
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound(resource) => ApiError::NotFound(resource),
            CoreError::Validation(errors) => ApiError::Validation(errors),
            CoreError::AccessDenied => ApiError::Forbidden,
            CoreError::Store(detail) => ApiError::Upstream(detail),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                json!({ "error": format!("{resource} not found") }),
            ),
            ApiError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "error": "validation failed", "errors": errors }),
            ),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": "unauthorized" }),
            ),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, json!({ "error": "forbidden" })),
            ApiError::BadRequest(detail) => {
                (StatusCode::BAD_REQUEST, json!({ "error": detail }))
            }
            ApiError::Upstream(detail) => {
                tracing::error!(detail = %detail, "remote store failure");
                (
                    StatusCode::BAD_GATEWAY,
                    json!({ "error": "remote store unavailable" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
