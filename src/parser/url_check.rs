use lazy_static::lazy_static;
use regex::Regex;
use url::Url;

use super::errors::ParseError;

lazy_static! {
    // 粗判输入是不是一个没带协议的域名开头地址
    static ref DOMAIN_LIKE: Regex =
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9.-]*\.[A-Za-z]{2,}(/\S*)?$").unwrap();
}

/// 规范化用户输入的媒体链接
///
/// 各页面以前各写了一份校验逻辑，这里是唯一实现：
/// 去首尾空白、裸域名补全 https、只放行 http(s)
pub fn normalize_media_url(input: &str) -> Result<String, ParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ParseError::EmptyInput);
    }

    let candidate = if DOMAIN_LIKE.is_match(trimmed) {
        format!("https://{}", trimmed)
    } else {
        trimmed.to_string()
    };

    let url =
        Url::parse(&candidate).map_err(|_| ParseError::InvalidUrl(trimmed.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(ParseError::UnsupportedScheme(other.to_string())),
    }
    if url.host_str().is_none() {
        return Err(ParseError::InvalidUrl(trimmed.to_string()));
    }

    Ok(url.into())
}
