use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use medkit_client::common::api::error::ApiError;
use medkit_client::downloader::registry::JobRegistry;
use medkit_client::progress::models::{JobStatus, NO_PROGRESS_MESSAGE, ProgressReading};
use medkit_client::progress::poller::{PollConfig, PollOutcome, ProgressPoller, ProgressSource};
use medkit_client::progress::smoother::ProgressSmoother;

/// 脚本化的进度数据源：按顺序吐读数，最后一条重复返回
struct ScriptedSource {
    readings: Mutex<VecDeque<Result<ProgressReading, ApiError>>>,
    calls: AtomicU32,
}

impl ScriptedSource {
    fn new(readings: Vec<Result<ProgressReading, ApiError>>) -> Self {
        Self {
            readings: Mutex::new(readings.into()),
            calls: AtomicU32::new(0),
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProgressSource for ScriptedSource {
    async fn fetch_progress(&self, _job_id: &str) -> Result<ProgressReading, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut readings = self.readings.lock().await;
        if readings.len() > 1 {
            readings.pop_front().expect("队列非空")
        } else {
            match readings.front() {
                Some(Ok(reading)) => Ok(reading.clone()),
                _ => Err(ApiError::Unknown("脚本读数耗尽".to_string())),
            }
        }
    }
}

/// 一直不回包的数据源，用来验证取消能打断在途请求
struct HangingSource {
    calls: AtomicU32,
}

#[async_trait]
impl ProgressSource for HangingSource {
    async fn fetch_progress(&self, _job_id: &str) -> Result<ProgressReading, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(ProgressReading::new(0.0, "", JobStatus::Downloading))
    }
}

fn fast_config(max_attempts: Option<u32>) -> PollConfig {
    PollConfig {
        interval: Duration::from_millis(10),
        max_attempts,
        completion_threshold: 95.0,
    }
}

// ---- 平滑器 ----

#[tokio::test]
async fn test_smoother_out_of_order_readings() {
    let smoother = ProgressSmoother::new();

    smoother
        .update_progress(10.0, "downloading", JobStatus::Downloading)
        .await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    smoother
        .update_progress(45.0, "downloading", JobStatus::Downloading)
        .await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    let settled = smoother.snapshot().await;
    assert_eq!(settled.display_progress, 45.0);
    assert_eq!(settled.max_progress_seen, 45.0);

    // 乱序迟到的 30 不会把展示值拉回去
    smoother
        .update_progress(30.0, "downloading", JobStatus::Downloading)
        .await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    let after = smoother.snapshot().await;
    assert_eq!(after.max_progress_seen, 45.0);
    assert_eq!(after.display_progress, 45.0);
}

#[tokio::test]
async fn test_smoother_display_never_goes_backwards() {
    let smoother = ProgressSmoother::new();
    let mut last = 0.0_f64;

    for raw in [20.0, 60.0, 35.0, 80.0] {
        smoother
            .update_progress(raw, "downloading", JobStatus::Downloading)
            .await;
        // 动画进行中逐帧采样，任何一帧都不允许回退
        for _ in 0..10 {
            tokio::time::sleep(Duration::from_millis(30)).await;
            let snapshot = smoother.snapshot().await;
            assert!(
                snapshot.display_progress >= last,
                "展示值回退了: {} -> {}",
                last,
                snapshot.display_progress
            );
            assert!(snapshot.max_progress_seen >= snapshot.display_progress);
            last = snapshot.display_progress;
        }
    }

    assert_eq!(smoother.snapshot().await.display_progress, 80.0);
}

#[tokio::test]
async fn test_smoother_regressive_update_keeps_max() {
    let smoother = ProgressSmoother::new();

    smoother
        .update_progress(70.0, "downloading", JobStatus::Downloading)
        .await;
    smoother
        .update_progress(55.0, "downloading", JobStatus::Downloading)
        .await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    let snapshot = smoother.snapshot().await;
    assert_eq!(snapshot.max_progress_seen, 70.0);
    assert_eq!(snapshot.display_progress, 70.0);
}

#[tokio::test]
async fn test_smoother_handle_complete_always_hits_100() {
    let smoother = ProgressSmoother::new();

    smoother
        .update_progress(42.0, "downloading", JobStatus::Downloading)
        .await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    smoother.handle_complete().await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    let snapshot = smoother.snapshot().await;
    assert_eq!(snapshot.display_progress, 100.0);
    assert_eq!(snapshot.max_progress_seen, 100.0);
    assert_eq!(snapshot.status, JobStatus::Completed);
    assert_eq!(snapshot.message, "Complete!");
}

#[tokio::test]
async fn test_smoother_handle_error_keeps_display() {
    let smoother = ProgressSmoother::new();

    smoother
        .update_progress(50.0, "downloading", JobStatus::Downloading)
        .await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    let before = smoother.snapshot().await.display_progress;

    smoother.handle_error("服务端拒绝").await;
    let snapshot = smoother.snapshot().await;
    assert_eq!(snapshot.status, JobStatus::Error);
    assert_eq!(snapshot.message, "服务端拒绝");
    // 错误不清进度，最后展示的值留在原地
    assert_eq!(snapshot.display_progress, before);

    // 空消息落到兜底文案
    smoother.handle_error("").await;
    assert_eq!(smoother.snapshot().await.message, "Error occurred");
}

#[tokio::test]
async fn test_smoother_reset_mid_animation() {
    let smoother = ProgressSmoother::new();

    smoother
        .update_progress(90.0, "downloading", JobStatus::Downloading)
        .await;
    // 动画走到一半就复位
    tokio::time::sleep(Duration::from_millis(50)).await;
    smoother.reset().await;

    let snapshot = smoother.snapshot().await;
    assert_eq!(snapshot.display_progress, 0.0);
    assert_eq!(snapshot.max_progress_seen, 0.0);
    assert_eq!(snapshot.message, "");
    assert_eq!(snapshot.status, JobStatus::Idle);

    // 再等一段，确认动画确实被取消，不会把值偷偷抬回去
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(smoother.snapshot().await.display_progress, 0.0);
}

// ---- 轮询器 ----

#[tokio::test]
async fn test_poller_stops_on_completed_reading() {
    let source = Arc::new(ScriptedSource::new(vec![
        Ok(ProgressReading::new(30.0, "downloading", JobStatus::Downloading)),
        Ok(ProgressReading::new(60.0, "downloading", JobStatus::Downloading)),
        Ok(ProgressReading::new(100.0, "done", JobStatus::Completed)),
    ]));
    let poller = ProgressPoller::new(Arc::clone(&source), fast_config(Some(120)));
    let smoother = ProgressSmoother::new();

    let outcome = poller
        .run("job-1", &smoother, CancellationToken::new())
        .await;

    // 第 3 次拿到终态，之后不再调度第 4 次
    assert!(matches!(outcome, PollOutcome::Completed(_)));
    assert_eq!(source.calls(), 3);

    tokio::time::sleep(Duration::from_millis(300)).await;
    let snapshot = smoother.snapshot().await;
    assert_eq!(snapshot.status, JobStatus::Completed);
    assert_eq!(snapshot.display_progress, 100.0);
}

#[tokio::test]
async fn test_poller_soft_stop_after_max_attempts() {
    // 服务端一直没有进度数据，120 次后软停止
    let source = Arc::new(ScriptedSource::new(vec![Ok(ProgressReading::new(
        0.0,
        NO_PROGRESS_MESSAGE,
        JobStatus::Unknown,
    ))]));
    let poller = ProgressPoller::new(Arc::clone(&source), fast_config(Some(120)));
    let smoother = ProgressSmoother::new();

    let outcome = poller
        .run("job-2", &smoother, CancellationToken::new())
        .await;

    assert!(matches!(outcome, PollOutcome::Exhausted));
    assert_eq!(source.calls(), 120);

    // 软停止不强行判失败，展示状态保持原样
    let snapshot = smoother.snapshot().await;
    assert_eq!(snapshot.status, JobStatus::Idle);
    assert_eq!(snapshot.display_progress, 0.0);
}

#[tokio::test]
async fn test_poller_reports_server_failure() {
    let mut failed = ProgressReading::new(0.0, "", JobStatus::Failed);
    failed.error = Some("下载源不可用".to_string());

    let source = Arc::new(ScriptedSource::new(vec![
        Ok(ProgressReading::new(15.0, "downloading", JobStatus::Downloading)),
        Ok(failed),
    ]));
    let poller = ProgressPoller::new(Arc::clone(&source), fast_config(Some(120)));
    let smoother = ProgressSmoother::new();

    let outcome = poller
        .run("job-3", &smoother, CancellationToken::new())
        .await;

    match outcome {
        PollOutcome::Failed(message) => assert_eq!(message, "下载源不可用"),
        other => panic!("预期 Failed，实际 {:?}", other),
    }
    assert_eq!(source.calls(), 2);

    let snapshot = smoother.snapshot().await;
    assert_eq!(snapshot.status, JobStatus::Error);
    assert_eq!(snapshot.message, "下载源不可用");
}

#[tokio::test]
async fn test_poller_retries_transient_errors() {
    let source = Arc::new(ScriptedSource::new(vec![
        Err(ApiError::Unknown("连接被重置".to_string())),
        Err(ApiError::HttpStatus(502, "bad gateway".to_string())),
        Ok(ProgressReading::new(100.0, "done", JobStatus::Completed)),
    ]));
    let poller = ProgressPoller::new(Arc::clone(&source), fast_config(Some(120)));
    let smoother = ProgressSmoother::new();

    let outcome = poller
        .run("job-4", &smoother, CancellationToken::new())
        .await;

    // 瞬时错误静默重试，不会提前结束
    assert!(matches!(outcome, PollOutcome::Completed(_)));
    assert_eq!(source.calls(), 3);
}

#[tokio::test]
async fn test_poller_completed_below_threshold_keeps_polling() {
    let source = Arc::new(ScriptedSource::new(vec![Ok(ProgressReading::new(
        90.0,
        "almost",
        JobStatus::Completed,
    ))]));
    let poller = ProgressPoller::new(Arc::clone(&source), fast_config(Some(5)));
    let smoother = ProgressSmoother::new();

    let outcome = poller
        .run("job-5", &smoother, CancellationToken::new())
        .await;

    // completed 但没到 95 阈值，不算完成，轮询到上限后软停止
    assert!(matches!(outcome, PollOutcome::Exhausted));
    assert_eq!(source.calls(), 5);
    assert_eq!(smoother.snapshot().await.status, JobStatus::Idle);
}

#[tokio::test]
async fn test_poller_metadata_completion_carries_result() {
    let mut done = ProgressReading::new(0.0, "Info extracted", JobStatus::Completed);
    done.result = Some(serde_json::json!({ "title": "测试视频", "duration": 60.0 }));

    let source = Arc::new(ScriptedSource::new(vec![
        Ok(ProgressReading::new(-1.0, "Extracting info...", JobStatus::Fetching)),
        Ok(done),
    ]));
    let config = PollConfig {
        interval: Duration::from_millis(10),
        max_attempts: None,
        completion_threshold: 0.0,
    };
    let poller = ProgressPoller::new(Arc::clone(&source), config);
    let smoother = ProgressSmoother::new();

    let outcome = poller
        .run("task-1", &smoother, CancellationToken::new())
        .await;

    match outcome {
        PollOutcome::Completed(reading) => {
            let result = reading.result.expect("终态读数应带 result");
            assert_eq!(result["title"], "测试视频");
        }
        other => panic!("预期 Completed，实际 {:?}", other),
    }

    // 进度 -1 的读数只更新文案，不动展示值
    let snapshot = smoother.snapshot().await;
    assert!(snapshot.display_progress >= 0.0);
}

#[tokio::test]
async fn test_poller_cancellation_aborts_in_flight_request() {
    let source = Arc::new(HangingSource {
        calls: AtomicU32::new(0),
    });
    let smoother = ProgressSmoother::new();
    let cancel = CancellationToken::new();

    let handle = tokio::spawn({
        let source = Arc::clone(&source);
        let smoother = smoother.clone();
        let cancel = cancel.clone();
        async move {
            let poller = ProgressPoller::new(source, fast_config(Some(120)));
            poller.run("job-6", &smoother, cancel).await
        }
    });

    // 等第一次请求挂起后触发取消
    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();

    let outcome = handle.await.expect("轮询任务不应 panic");
    assert!(matches!(outcome, PollOutcome::Cancelled));
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);

    // 取消后不再有新的查询
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);

    let snapshot = smoother.snapshot().await;
    assert_eq!(snapshot.status, JobStatus::Cancelled);
}

// ---- 取消注册表 ----

#[tokio::test]
async fn test_registry_cancel_fires_registered_token() {
    let registry = JobRegistry::new();
    let token = registry.register("download_1");

    assert!(registry.contains("download_1"));
    assert!(!token.is_cancelled());

    assert!(registry.cancel("download_1"));
    assert!(token.is_cancelled());
    assert!(!registry.contains("download_1"));

    // 不存在的任务取消返回 false
    assert!(!registry.cancel("download_1"));
}

#[tokio::test]
async fn test_registry_reregister_cancels_previous_token() {
    let registry = JobRegistry::new();
    let first = registry.register("download_2");
    let second = registry.register("download_2");

    // 同 ID 重复登记，旧句柄被触发，新句柄接管
    assert!(first.is_cancelled());
    assert!(!second.is_cancelled());

    registry.cancel_all();
    assert!(second.is_cancelled());
    assert!(registry.active_jobs().is_empty());
}
