use std::collections::BTreeMap;

use axum::body::Bytes;
use axum_typed_multipart::{BaseMultipart, FieldData, TryFromMultipart};
use serde::Serialize;
use utoipa::ToSchema;

use super::error::AppError;
use crate::catalog::{ObjectDocument, UploadFile};
use crate::search::SearchHit;

/// 多部分表单提取器，解析失败时返回 JSON 错误
pub type Multipart<T> = BaseMultipart<T, AppError>;

/// 上传请求参数
#[derive(TryFromMultipart)]
pub struct UploadRequest {
    #[form_data(field_name = "objFiles", limit = "unlimited")]
    pub obj_files: Vec<FieldData<Bytes>>,
    #[form_data(limit = "unlimited")]
    pub images: Vec<FieldData<Bytes>>,
    #[form_data(limit = "unlimited")]
    pub thumbnails: Vec<FieldData<Bytes>>,
    pub category: Option<String>,
}

/// 上传表单（用于API文档）
#[derive(Debug, Serialize, ToSchema)]
#[allow(unused)]
pub struct UploadForm {
    /// 上传的 3D 模型，可以是多个文件
    #[serde(rename = "objFiles")]
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub obj_files: String,
    /// 图片，可代替 `objFiles` 使用
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub images: Option<String>,
    /// 缩略图，按文件名（不含扩展名）匹配模型
    #[schema(format = Binary, content_media_type = "image/*")]
    pub thumbnails: Option<String>,
    /// 本次上传所有文件的分类
    pub category: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    pub message: String,
    /// 保存的文件名
    pub files: Vec<String>,
    /// 每个文件的特征
    #[schema(value_type = Object)]
    pub results: BTreeMap<String, Option<crate::descriptor::Characteristics>>,
}

/// 搜索请求参数
#[derive(TryFromMultipart)]
pub struct SearchRequest {
    #[form_data(limit = "unlimited")]
    pub file: Option<FieldData<Bytes>>,
    pub top_n: Option<usize>,
    pub w1: Option<f64>,
    pub w2: Option<f64>,
}

/// 搜索表单（用于API文档）
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct SearchForm {
    /// 查询模型
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub file: String,
    /// 返回结果数量
    pub top_n: Option<usize>,
    /// 傅里叶系数距离的权重
    pub w1: Option<f64>,
    /// Zernike 矩距离的权重
    pub w2: Option<f64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SearchResponse {
    /// 搜索耗时，单位为毫秒
    pub time: u128,
    pub results: Vec<SearchHit>,
}

/// 网格简化请求参数
#[derive(TryFromMultipart)]
pub struct TransformRequest {
    #[form_data(limit = "unlimited")]
    pub object: Option<FieldData<Bytes>>,
    pub reduction_rate: Option<String>,
}

/// 网格简化表单（用于API文档）
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct TransformForm {
    /// OBJ 模型
    #[schema(format = Binary, content_media_type = "model/obj")]
    pub object: String,
    /// 不长于该值的边会被合并
    pub reduction_rate: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FileListResponse {
    pub images: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DocumentsResponse {
    pub images: Vec<ObjectDocument>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DocumentResponse {
    pub image: Vec<ObjectDocument>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// 将表单字段转换为上传文件
pub fn upload_file(field: FieldData<Bytes>) -> UploadFile {
    UploadFile {
        name: field.metadata.file_name.unwrap_or_default(),
        contents: field.contents.to_vec(),
    }
}
