use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::common::api::client::MedkitClient;
use crate::common::api::error::ApiError;
use crate::common::logger::PrettyLogger;
use crate::downloader::registry::JobRegistry;
use crate::downloader::stream;
use crate::progress::display::ProgressRenderer;
use crate::progress::models::ProgressReading;
use crate::progress::poller::{PollConfig, PollOutcome, ProgressPoller, ProgressSource};
use crate::progress::smoother::ProgressSmoother;

pub mod error;

use error::ConvertError;

/// 转换任务资源适配成轮询数据源
pub struct ConversionProgressSource {
    client: MedkitClient,
}

impl ConversionProgressSource {
    pub fn new(client: MedkitClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProgressSource for ConversionProgressSource {
    async fn fetch_progress(&self, job_id: &str) -> Result<ProgressReading, ApiError> {
        Ok(self.client.get_conversion(job_id).await?.to_reading())
    }
}

/// 文件转换工作流：上传 -> 轮询转换进度 -> 拉取产物
#[derive(Clone)]
pub struct MediaConverter {
    client: MedkitClient,
    registry: Arc<JobRegistry>,
    output_dir: PathBuf,
}

impl MediaConverter {
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

    /// 转换一个本地文件，返回产物落盘路径
    pub async fn convert(
        &self,
        input: &Path,
        output_format: &str,
        quality: &str,
    ) -> Result<PathBuf, ConvertError> {
        // 目标格式先对一遍服务端支持列表，免得传完文件才被拒
        match self.client.supported_formats().await {
            Ok(formats) if !formats.supports(output_format) => {
                return Err(ConvertError::UnsupportedFormat(output_format.to_string()));
            }
            Ok(_) => {}
            Err(err) => debug!("拉取支持格式列表失败，跳过本地校验: {}", err),
        }

        crate::log_step!("上传 {}", input.display());
        let request = self
            .client
            .create_conversion(input, output_format, quality)
            .await?;
        info!("转换任务已创建: {}", request.id);

        // 转换是服务端异步任务，走慢速轮询直到终态
        let token = self.registry.register(&request.id);
        let smoother = ProgressSmoother::new();
        let renderer = ProgressRenderer::start(smoother.clone());
        let poller = ProgressPoller::new(
            Arc::new(ConversionProgressSource::new(self.client.clone())),
            PollConfig::metadata(),
        );
        let outcome = poller.run(&request.id, &smoother, token).await;
        self.registry.remove(&request.id);

        match outcome {
            PollOutcome::Completed(_) => {
                renderer.finish("转换完成");
            }
            PollOutcome::Failed(message) => {
                renderer.abandon("转换失败");
                return Err(ConvertError::Failed(message));
            }
            PollOutcome::Cancelled => {
                renderer.abandon("已取消");
                return Err(ConvertError::Cancelled(request.id));
            }
            // metadata 档位没有次数上限，到不了这里
            PollOutcome::Exhausted => {
                renderer.abandon("进度查询中断");
                return Err(ConvertError::Failed("进度查询中断".to_string()));
            }
        }

        // 产物是一次普通的长超时 GET，当成独立的小任务展示
        let latest = self.client.get_conversion(&request.id).await?;
        let artifact_url = latest.download_url.ok_or(ConvertError::NoArtifact)?;
        debug!("产物地址: {}", artifact_url);

        crate::log_step!("下载转换产物");
        let stem = input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("converted");
        let path = self
            .output_dir
            .join(format!("{}.{}", stem, output_format));

        let token = self.registry.register(&request.id);
        let fetch_smoother = ProgressSmoother::new();
        let fetch_renderer = ProgressRenderer::start(fetch_smoother.clone());
        let response = self.client.fetch_artifact(&artifact_url).await?;
        let result =
            stream::write_body_to_file(response, &path, &fetch_smoother, 0.0, &token).await;
        self.registry.remove(&request.id);

        match result {
            Ok(bytes) => {
                fetch_smoother.handle_complete().await;
                fetch_renderer.finish("产物已保存");
                PrettyLogger::file_info("输出", path.to_string_lossy());
                debug!("产物大小: {} 字节", bytes);
                Ok(path)
            }
            Err(err) => {
                fetch_renderer.abandon("产物下载失败");
                Err(match err {
                    crate::downloader::error::DownloadError::Cancelled(id) => {
                        ConvertError::Cancelled(id)
                    }
                    crate::downloader::error::DownloadError::Api(api) => ConvertError::Api(api),
                    crate::downloader::error::DownloadError::Io(io) => ConvertError::Io(io),
                    other => ConvertError::Failed(other.to_string()),
                })
            }
        }
    }
}
