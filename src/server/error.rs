use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum_typed_multipart::TypedMultipartError;
use log::error;
use serde_json::json;

use crate::catalog::CatalogError;

pub type Result<T, E = AppError> = std::result::Result<T, E>;

/// API错误类型，渲染为 `{"message": ..., "error": ...}`
pub struct AppError(pub anyhow::Error);

impl AppError {
    fn status(&self) -> StatusCode {
        if self.0.is::<TypedMultipartError>() {
            return StatusCode::BAD_REQUEST;
        }
        match self.0.downcast_ref::<CatalogError>() {
            Some(CatalogError::NotFound(_)) => StatusCode::NOT_FOUND,
            Some(CatalogError::Invalid(_)) => StatusCode::BAD_REQUEST,
            None => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("request failed: {:#}", self.0);
            json!({ "message": "Something went wrong", "error": format!("{:#}", self.0) })
        } else {
            json!({ "message": self.0.to_string() })
        };
        (status, Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
