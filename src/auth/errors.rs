use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("接口调用失败: {0}")]
    Api(#[from] crate::common::api::error::ApiError),

    #[error("IO 操作失败: {0}")]
    Io(#[from] std::io::Error),

    #[error("令牌序列化失败: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("尚未登录，请先执行 medkit login")]
    NotLoggedIn,
}

pub type Result<T> = std::result::Result<T, AuthError>;
