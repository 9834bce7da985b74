use std::sync::Arc;

use tracing::info;

use crate::common::api::client::MedkitClient;
use crate::common::api::models::auth::{RegisterRequest, UserInfo};

use super::errors::{AuthError, Result};
use super::token::TokenStore;

/// 会话管理：登录/注册/登出，令牌的持久化交给 TokenStore
///
/// 不负责令牌的签发，那是服务端的事
pub struct AuthManager {
    client: MedkitClient,
    tokens: Arc<TokenStore>,
}

impl AuthManager {
    pub fn new(client: MedkitClient, tokens: Arc<TokenStore>) -> Self {
        Self { client, tokens }
    }

    /// 邮箱密码登录，成功后令牌对写入磁盘
    pub async fn login(&self, email: &str, password: &str) -> Result<UserInfo> {
        let response = self.client.login(email, password).await?;
        self.tokens
            .set_pair(response.access, response.refresh)
            .await?;
        info!("登录成功: {}", response.user.email);
        Ok(response.user)
    }

    /// 注册并直接登录
    pub async fn register(&self, request: RegisterRequest) -> Result<UserInfo> {
        let response = self.client.register(&request).await?;
        self.tokens
            .set_pair(response.access, response.refresh)
            .await?;
        info!("注册成功: {}", response.user.email);
        Ok(response.user)
    }

    /// 登出：先尽力通知服务端作废令牌，再清掉本地副本
    pub async fn logout(&self) -> Result<()> {
        self.client.logout().await;
        self.tokens.clear().await
    }

    /// 需要登录态的命令先过这一道
    pub async fn require_login(&self) -> Result<()> {
        if self.tokens.is_logged_in().await {
            Ok(())
        } else {
            Err(AuthError::NotLoggedIn)
        }
    }
}
