use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

/// 活跃任务的取消句柄注册表
///
/// 句柄按任务 ID 登记，注册表随下载器实例存亡，不做进程级全局状态。
/// cancel 同时打断该任务的轮询调度和在途请求
#[derive(Debug, Default)]
pub struct JobRegistry {
    tokens: DashMap<String, CancellationToken>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            tokens: DashMap::new(),
        }
    }

    /// 为任务登记一个新句柄；同 ID 重复登记会先触发旧句柄
    pub fn register(&self, job_id: &str) -> CancellationToken {
        let token = CancellationToken::new();
        if let Some(previous) = self.tokens.insert(job_id.to_string(), token.clone()) {
            previous.cancel();
        }
        token
    }

    /// 触发取消并摘除句柄；任务不存在时返回 false
    pub fn cancel(&self, job_id: &str) -> bool {
        match self.tokens.remove(job_id) {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// 任务正常结束后摘除句柄
    pub fn remove(&self, job_id: &str) {
        self.tokens.remove(job_id);
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.tokens.contains_key(job_id)
    }

    /// 当前登记的任务 ID
    pub fn active_jobs(&self) -> Vec<String> {
        self.tokens.iter().map(|e| e.key().clone()).collect()
    }

    /// 取消全部活跃任务
    pub fn cancel_all(&self) {
        for entry in self.tokens.iter() {
            entry.value().cancel();
        }
        self.tokens.clear();
    }
}
