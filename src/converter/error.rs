use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("接口调用失败: {0}")]
    Api(#[from] crate::common::api::error::ApiError),

    #[error("IO 操作失败: {0}")]
    Io(#[from] std::io::Error),

    #[error("服务端不支持目标格式: {0}")]
    UnsupportedFormat(String),

    #[error("转换失败: {0}")]
    Failed(String),

    #[error("任务已取消: {0}")]
    Cancelled(String),

    #[error("转换完成但服务端没有给出产物地址")]
    NoArtifact,
}
