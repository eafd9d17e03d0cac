mod api;
mod error;
mod state;
mod types;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use self::state::*;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::upload_handler,
        api::list_files_handler,
        api::download_handler,
        api::thumbnail_handler,
        api::delete_all_handler,
        api::delete_handler,
        api::documents_handler,
        api::document_handler,
        api::category_handler,
        api::search_handler,
        api::transform_handler,
    ),
    components(schemas(
        types::UploadForm,
        types::UploadResponse,
        types::SearchForm,
        types::SearchResponse,
        types::TransformForm,
        types::FileListResponse,
        types::DocumentsResponse,
        types::DocumentResponse,
        types::MessageResponse,
    ))
)]
pub struct ApiDoc;

/// 构建API服务器
pub fn create_app(state: Arc<AppState>, body_limit: usize) -> Router {
    Router::new()
        .route("/upload", post(api::upload_handler))
        .route("/download", get(api::list_files_handler))
        .route("/download/{filename}", get(api::download_handler))
        .route("/thumbnail/{filename}", get(api::thumbnail_handler))
        .route("/delete", delete(api::delete_all_handler))
        .route("/delete/{filename}", delete(api::delete_handler))
        .route("/images", get(api::documents_handler))
        .route("/images/{filename}", get(api::document_handler))
        .route("/images/category/{category}", get(api::category_handler))
        .route("/search", post(api::search_handler))
        .route("/transform", post(api::transform_handler))
        .route("/metrics", get(api::metrics_handler))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
