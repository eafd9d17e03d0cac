use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderName, StatusCode, header};
use axum::response::IntoResponse;
use log::info;

use super::error::Result;
use super::state::AppState;
use super::types::*;
use crate::catalog::{CatalogError, UploadBatch};
use crate::config::SearchOptions;
use crate::{metrics, utils};

/// 上传模型，计算特征并写入目录
#[utoipa::path(
    post,
    path = "/upload",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, body = UploadResponse),
        (status = 400, body = MessageResponse),
    )
)]
pub async fn upload_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart<UploadRequest>,
) -> Result<(StatusCode, Json<UploadResponse>)> {
    let data = multipart.data;
    let batch = UploadBatch {
        files: data.obj_files.into_iter().chain(data.images).map(upload_file).collect(),
        thumbnails: data.thumbnails.into_iter().map(upload_file).collect(),
        category: data.category,
    };
    let outcome = state.catalog.upload(batch).await?;
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            message: "Images uploaded and processed successfully".to_string(),
            files: outcome.files,
            results: outcome.results,
        }),
    ))
}

/// 列出已上传的文件名
#[utoipa::path(get, path = "/download", responses((status = 200, body = FileListResponse)))]
pub async fn list_files_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<FileListResponse>> {
    Ok(Json(FileListResponse { images: state.catalog.list_files().await? }))
}

/// 下载已上传的文件
#[utoipa::path(
    get,
    path = "/download/{filename}",
    responses(
        (status = 200, content_type = "application/octet-stream"),
        (status = 404, body = MessageResponse),
    )
)]
pub async fn download_handler(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse> {
    let data = state.catalog.download(&filename).await?;
    Ok(([(header::CONTENT_TYPE, utils::content_type(&filename))], data))
}

/// 下载模型的缩略图
#[utoipa::path(
    get,
    path = "/thumbnail/{filename}",
    responses(
        (status = 200, content_type = "image/*"),
        (status = 404, body = MessageResponse),
    )
)]
pub async fn thumbnail_handler(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse> {
    let data = state.catalog.thumbnail(&filename).await?;
    Ok(([(header::CONTENT_TYPE, utils::content_type(&filename))], data))
}

/// 删除所有已上传的文件及其元数据
#[utoipa::path(delete, path = "/delete", responses((status = 200, body = MessageResponse)))]
pub async fn delete_all_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<MessageResponse>> {
    state.catalog.delete_all().await?;
    Ok(Json(MessageResponse::new("All images deleted successfully")))
}

/// 删除一个已上传的文件及其元数据
#[utoipa::path(
    delete,
    path = "/delete/{filename}",
    responses(
        (status = 200, body = MessageResponse),
        (status = 404, body = MessageResponse),
    )
)]
pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Json<MessageResponse>> {
    state.catalog.delete(&filename).await?;
    Ok(Json(MessageResponse::new(format!("Image '{filename}' deleted successfully"))))
}

/// 获取所有文档
#[utoipa::path(
    get,
    path = "/images",
    responses(
        (status = 200, body = DocumentsResponse),
        (status = 404, body = MessageResponse),
    )
)]
pub async fn documents_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DocumentsResponse>> {
    let images = state.catalog.documents().await?;
    if images.is_empty() {
        return Err(CatalogError::NotFound("No files found".to_string()).into());
    }
    Ok(Json(DocumentsResponse { images }))
}

/// 按文件名获取文档
#[utoipa::path(
    get,
    path = "/images/{filename}",
    responses(
        (status = 200, body = DocumentResponse),
        (status = 404, body = MessageResponse),
    )
)]
pub async fn document_handler(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Json<DocumentResponse>> {
    let image = state.catalog.documents_by_filename(&filename).await?;
    if image.is_empty() {
        return Err(CatalogError::NotFound("No files found".to_string()).into());
    }
    Ok(Json(DocumentResponse { image }))
}

/// 按分类获取文档
#[utoipa::path(
    get,
    path = "/images/category/{category}",
    responses((status = 200, body = DocumentsResponse))
)]
pub async fn category_handler(
    State(state): State<Arc<AppState>>,
    Path(category): Path<String>,
) -> Result<Json<DocumentsResponse>> {
    Ok(Json(DocumentsResponse { images: state.catalog.documents_by_category(&category).await? }))
}

/// 按与上传模型的相似度排序
#[utoipa::path(
    post,
    path = "/search",
    request_body(content = SearchForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, body = SearchResponse),
        (status = 400, body = MessageResponse),
    )
)]
pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart<SearchRequest>,
) -> Result<Json<SearchResponse>> {
    let data = multipart.data;
    let Some(file) = data.file else {
        return Err(CatalogError::Invalid("Model file is required".to_string()).into());
    };
    let opts = SearchOptions {
        top_n: data.top_n.unwrap_or(state.search.top_n),
        w1: data.w1.unwrap_or(state.search.w1),
        w2: data.w2.unwrap_or(state.search.w2),
    };

    let start = Instant::now();
    let file = upload_file(file);
    info!("searching models similar to {:?}", file.name);
    let results = state.catalog.search(&file.name, file.contents, opts).await?;

    Ok(Json(SearchResponse { time: start.elapsed().as_millis(), results }))
}

const ORIGINAL_VERTICES: &str = "x-original-vertices";
const VERTICES: &str = "x-vertices";
const COLLAPSED_EDGES: &str = "x-collapsed-edges";

/// 合并短边以简化 OBJ 模型
#[utoipa::path(
    post,
    path = "/transform",
    request_body(content = TransformForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, content_type = "model/obj", headers(
            ("x-original-vertices" = usize, description = "顶点数（简化前）"),
            ("x-vertices" = usize, description = "顶点数（简化后）"),
            ("x-collapsed-edges" = usize, description = "合并的边数"),
        )),
        (status = 400, body = MessageResponse),
    )
)]
pub async fn transform_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart<TransformRequest>,
) -> Result<impl IntoResponse> {
    let data = multipart.data;
    let Some(object) = data.object else {
        return Err(CatalogError::Invalid("No object provided".to_string()).into());
    };
    let rate = data
        .reduction_rate
        .and_then(|rate| rate.trim().parse::<f64>().ok())
        .filter(|rate| rate.is_finite() && *rate > 0.0)
        .ok_or_else(|| {
            CatalogError::Invalid("Reduction rate is required and must be a float".to_string())
        })?;

    let file = upload_file(object);
    let text = String::from_utf8(file.contents)
        .map_err(|_| CatalogError::Invalid("OBJ file is not valid UTF-8".to_string()))?;
    let transformed = state.catalog.transform(&file.name, &text, rate).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "model/obj".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", transformed.filename),
            ),
            (HeaderName::from_static(ORIGINAL_VERTICES), transformed.original_vertices.to_string()),
            (HeaderName::from_static(VERTICES), transformed.vertices.to_string()),
            (HeaderName::from_static(COLLAPSED_EDGES), transformed.collapsed_edges.to_string()),
        ],
        transformed.obj,
    ))
}

/// Prometheus 指标
pub async fn metrics_handler() -> Result<impl IntoResponse> {
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], metrics::render()?))
}
