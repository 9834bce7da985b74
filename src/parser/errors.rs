use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("输入为空")]
    EmptyInput,

    #[error("无效的URL: {0}")]
    InvalidUrl(String),

    #[error("不支持的链接协议: {0}")]
    UnsupportedScheme(String),
}
