use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("网络请求失败: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("响应解析失败: {0}")]
    InvalidResponse(String),

    #[error("需要登录认证")]
    AuthRequired,

    #[error("HTTP 错误 {0}: {1}")]
    HttpStatus(u16, String),

    #[error("IO 操作失败: {0}")]
    Io(#[from] std::io::Error),

    #[error("操作超时")]
    OperationTimeout,

    #[error("未知错误: {0}")]
    Unknown(String),
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidResponse(e.to_string())
    }
}

impl ApiError {
    /// 是否为超时类错误，界面上要和普通失败区分开
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::OperationTimeout => true,
            Self::Reqwest(e) => e.is_timeout(),
            _ => false,
        }
    }
}
