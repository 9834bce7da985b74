use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::progress::models::JobStatus;

/// 下载选项，来自命令行
#[derive(Debug, Clone, Default)]
pub struct DownloadOptions {
    /// 期望画质（如 1080p / 720p），服务端格式列表里找不到时回退默认
    pub quality: Option<String>,
    /// 只要音频
    pub audio_only: bool,
}

/// 任务列表里的一条下载记录
///
/// 失败的条目留在列表里并带上错误信息，不自动重试
#[derive(Debug, Clone)]
pub struct DownloadItem {
    pub id: String,
    pub url: String,
    pub title: String,
    pub status: JobStatus,
    pub format: String,
    pub quality: String,
    pub created_at: DateTime<Utc>,
    pub output_path: Option<PathBuf>,
    pub error: Option<String>,
}

impl DownloadItem {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            title: String::new(),
            status: JobStatus::Pending,
            format: String::new(),
            quality: String::new(),
            created_at: Utc::now(),
            output_path: None,
            error: None,
        }
    }
}
