use medkit_client::parser::errors::ParseError;
use medkit_client::parser::normalize_media_url;

#[test]
fn test_normalize_keeps_valid_http_url() {
    let url = normalize_media_url("  https://www.youtube.com/watch?v=abc123  ")
        .expect("合法链接应通过校验");
    assert_eq!(url, "https://www.youtube.com/watch?v=abc123");
}

#[test]
fn test_normalize_prefixes_bare_domain() {
    let url = normalize_media_url("www.youtube.com/watch?v=abc123").expect("裸域名应补全协议");
    assert!(url.starts_with("https://www.youtube.com/"));

    let short = normalize_media_url("youtu.be/abc123").expect("短链接同样补全");
    assert!(short.starts_with("https://youtu.be/"));
}

#[test]
fn test_normalize_rejects_empty_input() {
    assert!(matches!(
        normalize_media_url("   "),
        Err(ParseError::EmptyInput)
    ));
}

#[test]
fn test_normalize_rejects_non_http_scheme() {
    assert!(matches!(
        normalize_media_url("ftp://example.com/video.mp4"),
        Err(ParseError::UnsupportedScheme(_))
    ));
}

#[test]
fn test_normalize_rejects_junk() {
    assert!(matches!(
        normalize_media_url("这不是一个链接"),
        Err(ParseError::InvalidUrl(_))
    ));
}
