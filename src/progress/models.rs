use std::fmt;

use serde::{Deserialize, Serialize};

/// 服务端尚未写入进度数据时返回的哨兵消息
pub const NO_PROGRESS_MESSAGE: &str = "No progress data available";

/// 进度未知（元信息提取等阶段）的哨兵值
pub const INDETERMINATE_PROGRESS: f64 = -1.0;

/// 任务状态，与服务端 JSON 里的 status 字段一一对应
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Idle,
    Pending,
    Processing,
    Downloading,
    Fetching,
    ReadyForDownload,
    Completed,
    Failed,
    Error,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    /// 是否为终态，之后不再对该任务轮询
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Error | Self::Cancelled
        )
    }

    /// 是否为服务端报告的失败类终态
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Failed | Self::Error | Self::Cancelled)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Idle => "idle",
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Downloading => "downloading",
            Self::Fetching => "fetching",
            Self::ReadyForDownload => "ready_for_download",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        };
        write!(f, "{}", text)
    }
}

/// 服务端返回的单次进度快照
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProgressReading {
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
}

impl ProgressReading {
    pub fn new(progress: f64, message: impl Into<String>, status: JobStatus) -> Self {
        Self {
            progress,
            message: message.into(),
            status,
            error: None,
            result: None,
        }
    }

    /// 服务端还没开始写进度，区别于真正的 0%
    pub fn is_no_data_yet(&self) -> bool {
        self.progress == 0.0 && self.message == NO_PROGRESS_MESSAGE
    }

    /// 进度未知，只有 message/status 有意义
    pub fn is_indeterminate(&self) -> bool {
        self.progress < 0.0
    }
}

/// 客户端派生的展示状态
///
/// 不变量：display_progress 单调不减（直到 reset），
/// 且任何时刻 max_progress_seen >= display_progress
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProgressSnapshot {
    pub display_progress: f64,
    pub max_progress_seen: f64,
    pub message: String,
    pub status: JobStatus,
}
