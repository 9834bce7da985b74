use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Duration;

use super::models::{JobStatus, ProgressSnapshot};

/// 动画总时长
const ANIMATION_DURATION_MS: u64 = 200;
/// 动画离散步数
const ANIMATION_STEPS: u32 = 10;

struct SmootherShared {
    // 动画任务自己另持有一份 state 的 Arc，句柄销毁时动画才能被单独掐掉
    state: Arc<Mutex<ProgressSnapshot>>,
    anim: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for SmootherShared {
    fn drop(&mut self) {
        // 持有方销毁时取消还在排队的动画步进
        if let Some(handle) = self.anim.get_mut().take() {
            handle.abort();
        }
    }
}

/// 进度平滑器：把可能乱序、回退的原始进度序列收敛成单调递增的展示值
///
/// 状态机：idle -> animating -> {idle(到达目标), error}；
/// reset 可从任意状态回到 idle，error 在 reset 前保持终态
#[derive(Clone)]
pub struct ProgressSmoother {
    shared: Arc<SmootherShared>,
}

impl Default for ProgressSmoother {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSmoother {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(SmootherShared {
                state: Arc::new(Mutex::new(ProgressSnapshot::default())),
                anim: Mutex::new(None),
            }),
        }
    }

    /// 读取当前展示状态
    pub async fn snapshot(&self) -> ProgressSnapshot {
        self.shared.state.lock().await.clone()
    }

    /// 接收一次原始进度读数
    ///
    /// 防回退：目标值取历史最大，展示值只会前进；message/status 立即生效，
    /// 进度值经约 200ms 的 10 步插值动画靠近目标
    pub async fn update_progress(&self, raw_progress: f64, message: &str, status: JobStatus) {
        let (start, target) = {
            let mut state = self.shared.state.lock().await;
            let effective = raw_progress.max(state.max_progress_seen);
            state.max_progress_seen = effective;
            state.message = message.to_string();
            state.status = status;
            (state.display_progress, effective)
        };

        if target <= start {
            // 回退或重复读数，不起新动画
            return;
        }

        let step_size = (target - start) / ANIMATION_STEPS as f64;
        let step_duration =
            Duration::from_millis(ANIMATION_DURATION_MS / ANIMATION_STEPS as u64);

        // 后到的更新直接替换进行中的动画
        let mut anim = self.shared.anim.lock().await;
        if let Some(handle) = anim.take() {
            handle.abort();
        }

        let state = Arc::clone(&self.shared.state);
        *anim = Some(tokio::spawn(async move {
            for step in 1..=ANIMATION_STEPS {
                tokio::time::sleep(step_duration).await;
                let mut state = state.lock().await;
                if step == ANIMATION_STEPS {
                    // 最后一步对齐目标值，消除取整累积的偏差
                    state.display_progress = target;
                } else {
                    state.display_progress = (start + step_size * step as f64).round();
                }
            }
        }));
    }

    /// 复位到初始状态，开新任务前调用；动画进行中调用也安全
    pub async fn reset(&self) {
        if let Some(handle) = self.shared.anim.lock().await.take() {
            handle.abort();
        }
        let mut state = self.shared.state.lock().await;
        *state = ProgressSnapshot::default();
    }

    /// 终态：把展示值推到整 100
    pub async fn handle_complete(&self) {
        self.update_progress(100.0, "Complete!", JobStatus::Completed)
            .await;
    }

    /// 终态：记录错误并停止动画，保留最后展示的进度值
    pub async fn handle_error(&self, error_message: &str) {
        self.finish_with(JobStatus::Error, error_message, "Error occurred")
            .await;
    }

    /// 本地取消：终态 cancelled，同样保留已展示的进度
    pub async fn handle_cancelled(&self, message: &str) {
        self.finish_with(JobStatus::Cancelled, message, "Cancelled")
            .await;
    }

    async fn finish_with(&self, status: JobStatus, message: &str, fallback: &str) {
        if let Some(handle) = self.shared.anim.lock().await.take() {
            handle.abort();
        }
        let mut state = self.shared.state.lock().await;
        state.status = status;
        state.message = if message.is_empty() {
            fallback.to_string()
        } else {
            message.to_string()
        };
    }
}
