use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use super::errors::Result;

/// 令牌文件的磁盘格式，对应浏览器端 localStorage 里的两个键
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredTokens {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

/// 访问/刷新令牌的持久化存储
///
/// 进程内读写走内存副本，每次变更落盘一次
pub struct TokenStore {
    path: PathBuf,
    tokens: RwLock<StoredTokens>,
}

impl TokenStore {
    /// 从令牌文件加载；文件不存在或损坏时从空状态开始
    pub async fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let tokens = match tokio::fs::read(&path).await {
            Ok(data) => serde_json::from_slice(&data).unwrap_or_else(|err| {
                debug!("令牌文件解析失败，忽略旧内容: {}", err);
                StoredTokens::default()
            }),
            Err(_) => StoredTokens::default(),
        };

        Self {
            path,
            tokens: RwLock::new(tokens),
        }
    }

    pub async fn access(&self) -> Option<String> {
        self.tokens.read().await.access_token.clone()
    }

    pub async fn refresh(&self) -> Option<String> {
        self.tokens.read().await.refresh_token.clone()
    }

    pub async fn is_logged_in(&self) -> bool {
        self.tokens.read().await.access_token.is_some()
    }

    /// 登录/注册成功后写入整对令牌
    pub async fn set_pair(&self, access: String, refresh: String) -> Result<()> {
        let snapshot = {
            let mut tokens = self.tokens.write().await;
            tokens.access_token = Some(access);
            tokens.refresh_token = Some(refresh);
            tokens.clone()
        };
        self.persist(&snapshot).await
    }

    /// 刷新后只更新访问令牌
    pub async fn set_access(&self, access: String) -> Result<()> {
        let snapshot = {
            let mut tokens = self.tokens.write().await;
            tokens.access_token = Some(access);
            tokens.clone()
        };
        self.persist(&snapshot).await
    }

    /// 登出时清空
    pub async fn clear(&self) -> Result<()> {
        let snapshot = {
            let mut tokens = self.tokens.write().await;
            *tokens = StoredTokens::default();
            tokens.clone()
        };
        self.persist(&snapshot).await
    }

    async fn persist(&self, tokens: &StoredTokens) -> Result<()> {
        let data = serde_json::to_vec_pretty(tokens)?;
        tokio::fs::write(&self.path, data).await?;
        Ok(())
    }
}
