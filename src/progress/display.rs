use indicatif::{ProgressBar, ProgressStyle};
use tokio::task::JoinHandle;
use tokio::time::Duration;

use super::smoother::ProgressSmoother;

/// 进度条跟随平滑器快照刷新的周期
const REFRESH_INTERVAL: Duration = Duration::from_millis(100);

/// 终端进度条渲染
///
/// 只读平滑器的快照，不参与任何进度计算；终态或放弃时收尾
pub struct ProgressRenderer {
    pb: ProgressBar,
    refresher: Option<JoinHandle<()>>,
}

impl ProgressRenderer {
    pub fn start(smoother: ProgressSmoother) -> Self {
        let pb = ProgressBar::new(100);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );
        // 进度未知阶段至少让 spinner 动起来
        pb.enable_steady_tick(Duration::from_millis(120));

        // 刷新到 finish/abandon 为止；轮询可能先于流式写盘看到终态，
        // 渲染不能因此提前自杀
        let refresher = {
            let pb = pb.clone();
            tokio::spawn(async move {
                loop {
                    let snapshot = smoother.snapshot().await;
                    pb.set_position(snapshot.display_progress.round().max(0.0) as u64);
                    pb.set_message(snapshot.message.clone());
                    tokio::time::sleep(REFRESH_INTERVAL).await;
                }
            })
        };

        Self {
            pb,
            refresher: Some(refresher),
        }
    }

    /// 成功收尾，进度条落在 100%
    pub fn finish(mut self, message: &str) {
        self.stop_refresher();
        self.pb.set_position(100);
        self.pb.finish_with_message(message.to_string());
    }

    /// 失败/取消收尾，进度条停在当前位置
    pub fn abandon(mut self, message: &str) {
        self.stop_refresher();
        self.pb.abandon_with_message(message.to_string());
    }

    fn stop_refresher(&mut self) {
        if let Some(handle) = self.refresher.take() {
            handle.abort();
        }
    }
}

impl Drop for ProgressRenderer {
    fn drop(&mut self) {
        self.stop_refresher();
    }
}
