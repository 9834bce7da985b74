use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use lazy_static::lazy_static;
use rand::Rng;
use rand::distr::Alphanumeric;
use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::common::api::client::MedkitClient;
use crate::common::api::error::ApiError;
use crate::common::api::models::media::{StreamRequest, VideoFormat, VideoInfo};
use crate::common::logger::PrettyLogger;
use crate::parser;
use crate::progress::display::ProgressRenderer;
use crate::progress::models::{JobStatus, ProgressReading};
use crate::progress::poller::{PollConfig, PollOutcome, ProgressPoller, ProgressSource};
use crate::progress::smoother::ProgressSmoother;

pub mod error;
pub mod models;
pub mod registry;
pub mod stream;

use error::DownloadError;
use models::{DownloadItem, DownloadOptions};
use registry::JobRegistry;

/// 服务端轮询推进过的任务，客户端流式估算从这里起步
const SERVER_ACTIVE_START_PROGRESS: f64 = 95.0;

lazy_static! {
    // 文件名只保留字母数字、空格、横线和下划线
    static ref UNSAFE_FILENAME: Regex = Regex::new(r"[^A-Za-z0-9\s\-_]").unwrap();
}

/// 下载进度端点适配成轮询数据源
pub struct DownloadProgressSource {
    client: MedkitClient,
}

impl DownloadProgressSource {
    pub fn new(client: MedkitClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProgressSource for DownloadProgressSource {
    async fn fetch_progress(&self, job_id: &str) -> Result<ProgressReading, ApiError> {
        self.client.get_download_progress(job_id).await
    }
}

/// 媒体信息提取任务的进度端点
pub struct InfoProgressSource {
    client: MedkitClient,
}

impl InfoProgressSource {
    pub fn new(client: MedkitClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProgressSource for InfoProgressSource {
    async fn fetch_progress(&self, job_id: &str) -> Result<ProgressReading, ApiError> {
        self.client.get_info_progress(job_id).await
    }
}

/// URL 下载工作流：信息提取 -> 选格式 -> 状态轮询 + 批量传输 -> 落盘
#[derive(Clone)]
pub struct MediaDownloader {
    client: MedkitClient,
    registry: Arc<JobRegistry>,
    output_dir: PathBuf,
}

impl MediaDownloader {
    pub fn new(client: MedkitClient, output_dir: PathBuf) -> Self {
        Self {
            client,
            registry: Arc::new(JobRegistry::new()),
            output_dir,
        }
    }

    pub fn registry(&self) -> Arc<JobRegistry> {
        Arc::clone(&self.registry)
    }

    /// 下载一个 URL，返回带终态的任务条目
    pub async fn download(
        &self,
        raw_url: &str,
        options: &DownloadOptions,
    ) -> Result<DownloadItem, DownloadError> {
        let url = parser::normalize_media_url(raw_url)?;
        let download_id = new_download_id();
        let mut item = DownloadItem::new(&download_id, &url);

        // 第一步：提取媒体信息，这个阶段进度未知
        crate::log_step!("提取媒体信息");
        let info = self.fetch_video_info(&url).await?;
        item.title = info.title.clone();
        PrettyLogger::media_info(&info.title, format!("{:.0} 秒", info.duration));

        // 第二步：挑出要下载的格式
        let format = select_format(&info, options);
        info!("选定格式: {} ({})", format.quality, format.ext);
        item.format = format.ext.clone();
        item.quality = format.quality.clone();

        // 第三步：状态轮询 + 批量传输
        crate::log_step!("下载 {}", info.title);
        item.status = JobStatus::Processing;
        let token = self.registry.register(&download_id);
        let smoother = ProgressSmoother::new();
        let renderer = ProgressRenderer::start(smoother.clone());

        let result = self
            .transfer(&url, &info.title, &format, &download_id, &smoother, &token)
            .await;
        self.registry.remove(&download_id);

        match result {
            Ok(path) => {
                smoother.handle_complete().await;
                renderer.finish("下载完成");
                item.status = JobStatus::Completed;
                item.output_path = Some(path);
                Ok(item)
            }
            Err(err) => {
                match &err {
                    DownloadError::Cancelled(_) => {
                        smoother.handle_cancelled("Download cancelled").await;
                        renderer.abandon("已取消");
                        item.status = JobStatus::Cancelled;
                    }
                    DownloadError::TransferTimeout => {
                        smoother.handle_error("Transfer timed out").await;
                        renderer.abandon("传输超时");
                        item.status = JobStatus::Failed;
                    }
                    other => {
                        smoother.handle_error(&other.to_string()).await;
                        renderer.abandon("下载失败");
                        item.status = JobStatus::Failed;
                    }
                }
                item.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// 取消一个进行中的任务：先掐本地句柄，再尽力通知服务端
    pub fn cancel(&self, download_id: &str) -> bool {
        let cancelled = self.registry.cancel(download_id);
        if cancelled {
            self.client.cancel_download(download_id);
        }
        cancelled
    }

    /// 取消全部活跃任务（Ctrl-C 等场景）
    pub fn abort_all(&self) {
        for job_id in self.registry.active_jobs() {
            self.client.cancel_download(&job_id);
        }
        self.registry.cancel_all();
    }

    /// 发起信息提取任务并轮询到拿到结果
    async fn fetch_video_info(&self, url: &str) -> Result<VideoInfo, DownloadError> {
        let task = self.client.start_video_info(url).await?;
        debug!("信息提取任务: {}", task.task_id);

        let token = self.registry.register(&task.task_id);
        let smoother = ProgressSmoother::new();
        let poller = ProgressPoller::new(
            Arc::new(InfoProgressSource::new(self.client.clone())),
            PollConfig::metadata(),
        );
        let outcome = poller.run(&task.task_id, &smoother, token).await;
        self.registry.remove(&task.task_id);

        match outcome {
            PollOutcome::Completed(reading) => {
                let value = reading.result.ok_or_else(|| {
                    DownloadError::InfoExtraction("服务端未返回媒体信息".to_string())
                })?;
                serde_json::from_value::<VideoInfo>(value)
                    .map_err(|e| DownloadError::InfoExtraction(e.to_string()))
            }
            PollOutcome::Failed(message) => Err(DownloadError::InfoExtraction(message)),
            PollOutcome::Cancelled => Err(DownloadError::Cancelled(task.task_id)),
            // metadata 档位没有次数上限，到不了这里
            PollOutcome::Exhausted => {
                Err(DownloadError::InfoExtraction("进度查询中断".to_string()))
            }
        }
    }

    /// 批量传输，轮询先于请求启动，开头的服务端进度才不会漏掉
    async fn transfer(
        &self,
        url: &str,
        title: &str,
        format: &VideoFormat,
        download_id: &str,
        smoother: &ProgressSmoother,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, DownloadError> {
        let poller = ProgressPoller::new(
            Arc::new(DownloadProgressSource::new(self.client.clone())),
            PollConfig::transfer(),
        );
        let mut poll_handle = {
            let smoother = smoother.clone();
            let cancel = cancel.clone();
            let download_id = download_id.to_string();
            tokio::spawn(async move { poller.run(&download_id, &smoother, cancel).await })
        };
        let mut poll_done = false;

        let request = StreamRequest {
            url: url.to_string(),
            format_id: format.format_id.clone(),
            quality: format.quality.clone(),
            download_id: download_id.to_string(),
        };
        let stream_fut = self.client.stream_download(&request);
        tokio::pin!(stream_fut);

        // 批量请求阻塞期间轮询并行跑着；服务端经轮询报失败时
        // 直接带着服务端的错误信息终止，不等批量请求自己超时
        let response = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    poll_handle.abort();
                    return Err(DownloadError::Cancelled(download_id.to_string()));
                }
                outcome = &mut poll_handle, if !poll_done => {
                    poll_done = true;
                    if let Ok(PollOutcome::Failed(message)) = outcome {
                        return Err(DownloadError::Failed(message));
                    }
                    // Completed / 软停止：完成信号改由批量响应传递，接着等
                }
                resp = &mut stream_fut => {
                    break resp;
                }
            }
        };

        // 阻塞请求回包了，服务端侧的工作已经结束
        if !poll_done {
            poll_handle.abort();
        }

        let response = response.map_err(|err| {
            if err.is_timeout() {
                DownloadError::TransferTimeout
            } else {
                DownloadError::Api(err)
            }
        })?;

        let server_active = smoother.snapshot().await.max_progress_seen > 0.0;
        let start_progress = if server_active {
            SERVER_ACTIVE_START_PROGRESS
        } else {
            0.0
        };
        debug!(
            "开始接收响应体，起始进度 {}%（服务端进度{}激活）",
            start_progress,
            if server_active { "已" } else { "未" }
        );

        let path = self
            .output_dir
            .join(format!("{}.{}", sanitize_title(title), format.ext));
        stream::write_body_to_file(response, &path, smoother, start_progress, cancel).await?;

        Ok(path)
    }
}

/// 画质匹配不上时回退到预设，不让任务因此失败
fn select_format(info: &VideoInfo, options: &DownloadOptions) -> VideoFormat {
    if options.audio_only {
        return VideoFormat::preset_best_audio();
    }
    if let Some(wanted) = &options.quality {
        if let Some(format) = info
            .available_formats
            .iter()
            .find(|f| f.quality.eq_ignore_ascii_case(wanted))
        {
            return format.clone();
        }
        warn!("格式列表里没有 {}，回退到默认画质", wanted);
    }
    VideoFormat::preset_best_video()
}

/// 生成下载任务 ID，服务端用它作进度缓存键
fn new_download_id() -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(char::from)
        .collect();
    format!(
        "download_{}_{}",
        Utc::now().timestamp_millis(),
        suffix.to_lowercase()
    )
}

/// 标题转安全文件名，最长 50 个字符
fn sanitize_title(title: &str) -> String {
    let safe = UNSAFE_FILENAME.replace_all(title, "");
    let trimmed: String = safe.chars().take(50).collect();
    let trimmed = trimmed.trim().to_string();
    if trimmed.is_empty() {
        "media".to_string()
    } else {
        trimmed
    }
}
