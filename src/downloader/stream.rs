use std::path::Path;

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::progress::models::JobStatus;
use crate::progress::smoother::ProgressSmoother;

use super::error::DownloadError;

/// 响应头没给 Content-Length 时按收到的数据量兜底估算：每 MiB 约 2%
const FALLBACK_PERCENT_PER_MIB: f64 = 2.0;
/// 兜底估算的上限，真正的 100% 只能由写盘完成给出
const FALLBACK_CEILING: f64 = 99.0;
/// 流式写盘期间进度刷新的节流间隔
const STREAM_UPDATE_INTERVAL: Duration = Duration::from_millis(500);

/// 把批量传输的响应体流式写入磁盘，同时喂出基于字节数的次级进度估算
///
/// start_progress 是服务端轮询已经推进到的位置（活跃时 95，否则 0），
/// 字节进度被线性映射进 [start_progress, 100] 区间
pub async fn write_body_to_file(
    response: reqwest::Response,
    path: &Path,
    smoother: &ProgressSmoother,
    start_progress: f64,
    cancel: &CancellationToken,
) -> Result<u64, DownloadError> {
    let content_length = response.content_length();
    let mut stream = response.bytes_stream();
    let mut file = tokio::fs::File::create(path).await?;

    let mut received: u64 = 0;
    let mut last_update = Instant::now();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(DownloadError::Cancelled("传输中被取消".to_string()));
            }
            chunk = stream.next() => chunk,
        };

        let Some(chunk) = next else { break };
        let chunk = chunk.map_err(|err| {
            if err.is_timeout() {
                DownloadError::TransferTimeout
            } else {
                DownloadError::Api(err.into())
            }
        })?;

        file.write_all(&chunk).await?;
        received += chunk.len() as u64;

        // 节流，免得高频小块把终端刷爆
        if last_update.elapsed() >= STREAM_UPDATE_INTERVAL {
            let percent = estimate_progress(received, content_length, start_progress);
            let mib = received as f64 / 1024.0 / 1024.0;
            smoother
                .update_progress(
                    percent,
                    &format!("Downloading {:.0}MB ({:.0}%)", mib, percent),
                    JobStatus::Downloading,
                )
                .await;
            last_update = Instant::now();
        }
    }

    file.flush().await?;
    debug!("写盘完成: {:?} ({} 字节)", path, received);
    Ok(received)
}

/// 已收字节数 -> 进度百分比
fn estimate_progress(received: u64, content_length: Option<u64>, start_progress: f64) -> f64 {
    match content_length {
        Some(total) if total > 0 => {
            let body = received as f64 / total as f64 * 100.0;
            (start_progress + body * (100.0 - start_progress) / 100.0).round()
        }
        _ => {
            let mib = received as f64 / 1024.0 / 1024.0;
            (start_progress + (mib * FALLBACK_PERCENT_PER_MIB).round()).min(FALLBACK_CEILING)
        }
    }
}
