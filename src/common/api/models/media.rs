use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::progress::models::{JobStatus, ProgressReading};

/// 视频元信息，video-info 任务完成后放在读数的 result 字段里
#[derive(Debug, Clone, Deserialize)]
pub struct VideoInfo {
    pub title: String,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub thumbnail: String,
    #[serde(default)]
    pub available_formats: Vec<VideoFormat>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoFormat {
    pub quality: String,
    pub format_id: String,
    pub ext: String,
    #[serde(default)]
    pub filesize: Option<u64>,
    #[serde(default)]
    pub has_audio: bool,
    #[serde(default)]
    pub video_codec: String,
    #[serde(default)]
    pub audio_codec: String,
    #[serde(default)]
    pub fps: Option<f64>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub resolution: Option<String>,
}

impl VideoFormat {
    /// 纯音频预设，跳过格式列表直接要最优音轨
    pub fn preset_best_audio() -> Self {
        Self {
            quality: "audio".to_string(),
            format_id: "bestaudio[ext=mp3]/bestaudio/best[acodec!=none]".to_string(),
            ext: "mp3".to_string(),
            filesize: None,
            has_audio: true,
            video_codec: "none".to_string(),
            audio_codec: "auto".to_string(),
            fps: None,
            width: None,
            height: None,
            resolution: None,
        }
    }

    /// 默认预设：1080p 以内最佳画质
    pub fn preset_best_video() -> Self {
        Self {
            quality: "1080p".to_string(),
            format_id: "bestvideo[height<=1080]+bestaudio/best[height<=1080]".to_string(),
            ext: "mp4".to_string(),
            filesize: None,
            has_audio: true,
            video_codec: "auto".to_string(),
            audio_codec: "auto".to_string(),
            fps: None,
            width: None,
            height: None,
            resolution: None,
        }
    }
}

/// 发起 video-info 提取任务的响应
#[derive(Debug, Clone, Deserialize)]
pub struct InfoTaskResponse {
    pub task_id: String,
}

/// 批量传输端点的请求体
#[derive(Debug, Clone, Serialize)]
pub struct StreamRequest {
    pub url: String,
    pub format_id: String,
    pub quality: String,
    pub download_id: String,
}

/// 取消端点的请求体
#[derive(Debug, Clone, Serialize)]
pub struct CancelRequest {
    pub download_id: String,
}

/// 转换任务资源
#[derive(Debug, Clone, Deserialize)]
pub struct ConversionRequest {
    pub id: String,
    pub filename: String,
    pub status: JobStatus,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub input_format: String,
    pub output_format: String,
    #[serde(default)]
    pub quality: String,
    #[serde(default)]
    pub file_size: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl ConversionRequest {
    /// 适配成统一的进度读数，转换资源没有独立的 message 字段
    pub fn to_reading(&self) -> ProgressReading {
        let message = match self.status {
            JobStatus::Pending => "Waiting in queue".to_string(),
            JobStatus::Processing => format!("Converting to {}...", self.output_format),
            JobStatus::Completed => "Conversion complete".to_string(),
            _ => String::new(),
        };
        ProgressReading {
            progress: self.progress,
            message,
            status: self.status,
            error: self.error_message.clone(),
            result: None,
        }
    }
}

/// 服务端任务统计
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobStats {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub pending: u64,
    #[serde(default)]
    pub processing: u64,
    #[serde(default)]
    pub completed: u64,
    #[serde(default)]
    pub failed: u64,
    #[serde(default)]
    pub cancelled: u64,
}

/// 服务端支持的转换目标格式
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SupportedFormats {
    #[serde(default)]
    pub video: Vec<String>,
    #[serde(default)]
    pub audio: Vec<String>,
    #[serde(default)]
    pub image: Vec<String>,
}

impl SupportedFormats {
    pub fn supports(&self, format: &str) -> bool {
        self.video
            .iter()
            .chain(self.audio.iter())
            .chain(self.image.iter())
            .any(|f| f.eq_ignore_ascii_case(format))
    }
}
