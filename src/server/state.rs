use std::sync::Arc;

use crate::Catalog;
use crate::config::SearchOptions;

/// 应用状态
pub struct AppState {
    /// 模型目录
    pub catalog: Catalog,
    /// 默认搜索配置选项
    pub search: SearchOptions,
}

impl AppState {
    pub fn new(catalog: Catalog, search: SearchOptions) -> Arc<Self> {
        Arc::new(AppState { catalog, search })
    }
}
