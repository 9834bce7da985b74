use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::common::api::error::ApiError;

use super::models::{JobStatus, ProgressReading};
use super::smoother::ProgressSmoother;

/// 进度数据源，由 API 客户端按端点实现；测试里用脚本化的假实现
#[async_trait]
pub trait ProgressSource: Send + Sync {
    async fn fetch_progress(&self, job_id: &str) -> Result<ProgressReading, ApiError>;
}

/// 轮询参数
///
/// 间隔和阈值只有两套固定档位，调用点不另起炉灶
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// 两次状态查询的间隔
    pub interval: Duration,
    /// 最大查询次数，None 表示轮询到终态为止
    pub max_attempts: Option<u32>,
    /// completed 状态的进度达到该值才算完成
    pub completion_threshold: f64,
}

impl PollConfig {
    /// 批量传输期间的快速轮询：250ms x 120 次，约 30 秒
    pub fn transfer() -> Self {
        Self {
            interval: Duration::from_millis(250),
            max_attempts: Some(120),
            completion_threshold: 95.0,
        }
    }

    /// 元信息提取/格式转换的慢速轮询：1s 一次，轮询到终态为止。
    /// 这类任务的 completed 读数不带进度值，阈值为 0
    pub fn metadata() -> Self {
        Self {
            interval: Duration::from_millis(1000),
            max_attempts: None,
            completion_threshold: 0.0,
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::transfer()
    }
}

/// 轮询循环结束的原因
#[derive(Debug, Clone)]
pub enum PollOutcome {
    /// 服务端报告完成，附带最后一次读数（result 字段可能带任务产物）
    Completed(ProgressReading),
    /// 服务端报告失败
    Failed(String),
    /// 次数用尽的软停止：不代表任务失败，完成信号可能经由阻塞的批量传输响应到达
    Exhausted,
    /// 本地取消
    Cancelled,
}

/// 进度轮询器
///
/// 对一个任务 ID 周期性拉取状态、把读数喂给平滑器，自己只负责
/// "继续还是停"这一个判断：终态停、取消停、次数用尽软停
pub struct ProgressPoller<S: ProgressSource> {
    source: Arc<S>,
    config: PollConfig,
}

impl<S: ProgressSource> ProgressPoller<S> {
    pub fn new(source: Arc<S>, config: PollConfig) -> Self {
        Self { source, config }
    }

    pub async fn run(
        &self,
        job_id: &str,
        smoother: &ProgressSmoother,
        cancel: CancellationToken,
    ) -> PollOutcome {
        let mut attempts: u32 = 0;

        loop {
            if let Some(max) = self.config.max_attempts {
                if attempts >= max {
                    // 软停止：不标记失败，服务端可能根本没开进度缓存
                    debug!("任务 {} 轮询 {} 次仍无终态，停止轮询", job_id, attempts);
                    return PollOutcome::Exhausted;
                }
            }

            // 取消要同时打断排队等待和在途请求
            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    smoother.handle_cancelled("Download cancelled").await;
                    return PollOutcome::Cancelled;
                }
                result = async {
                    tokio::time::sleep(self.config.interval).await;
                    self.source.fetch_progress(job_id).await
                } => result,
            };
            attempts += 1;

            let reading = match fetched {
                Ok(reading) => reading,
                Err(err) => {
                    // 活跃传输期间的瞬时网络/HTTP 错误属于预期，静默重试
                    debug!("任务 {} 第 {} 次查询失败: {}", job_id, attempts, err);
                    continue;
                }
            };

            if reading.is_no_data_yet() {
                // 进度缓存还没建立，不能当成真正的 0% 回显
                continue;
            }

            if reading.status == JobStatus::Completed
                && reading.progress >= self.config.completion_threshold
            {
                smoother.handle_complete().await;
                return PollOutcome::Completed(reading);
            }

            if reading.status.is_failure() {
                let message = reading
                    .error
                    .clone()
                    .filter(|e| !e.is_empty())
                    .unwrap_or_else(|| {
                        if reading.message.is_empty() {
                            "Download failed".to_string()
                        } else {
                            reading.message.clone()
                        }
                    });
                smoother.handle_error(&message).await;
                return PollOutcome::Failed(message);
            }

            if reading.status == JobStatus::Completed {
                // completed 但进度没到阈值，服务端缓存还没收敛，继续轮询但不回显
                continue;
            }

            // 非终态读数（含 progress = -1 的未知进度）交给平滑器，
            // 防回退钳制由它统一处理
            smoother
                .update_progress(reading.progress, &reading.message, reading.status)
                .await;
        }
    }
}
