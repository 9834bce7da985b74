use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("接口调用失败: {0}")]
    Api(#[from] crate::common::api::error::ApiError),

    #[error("{0}")]
    InvalidUrl(#[from] crate::parser::errors::ParseError),

    #[error("IO 操作失败: {0}")]
    Io(#[from] std::io::Error),

    #[error("媒体信息提取失败: {0}")]
    InfoExtraction(String),

    #[error("传输超时")]
    TransferTimeout,

    #[error("任务已取消: {0}")]
    Cancelled(String),

    #[error("下载失败: {0}")]
    Failed(String),
}
