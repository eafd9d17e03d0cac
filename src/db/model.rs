use sqlx::FromRow;

/// 模型记录
#[derive(Debug, Clone, FromRow)]
pub struct ObjectRecord {
    pub id: i64,
    /// 上传目录中的文件名（已清理）
    pub filename: String,
    pub category: Option<String>,
    /// 上传时间，ISO-8601 UTC
    pub upload_date: String,
    /// 文件内容的 blake3 哈希
    pub hash: Vec<u8>,
    /// 缩略图文件名
    pub thumbnail: Option<String>,
    /// 特征服务返回的 JSON
    pub characteristics: String,
}

/// 上传时写入的字段
pub struct NewObject<'a> {
    pub filename: &'a str,
    pub category: Option<&'a str>,
    pub hash: &'a [u8],
    pub thumbnail: Option<&'a str>,
    pub characteristics: &'a str,
}
