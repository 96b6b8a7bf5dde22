use crate::persistence::StorageError;

/// 评分引擎统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum WorkshopError {
    /// 请求参数非法（缺少评分值、星级超出范围等），对应客户端错误
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// 插件不存在或已停用
    #[error("Not found: {0}")]
    NotFound(String),

    /// 底层存储不可用
    #[error("Storage unavailable: {0}")]
    Storage(#[from] StorageError),
}
