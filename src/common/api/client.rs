use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, ClientBuilder, Method, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::auth::token::TokenStore;
use crate::progress::models::ProgressReading;

use super::error::ApiError;
use super::models::auth::{LoginRequest, LoginResponse, RefreshRequest, RefreshResponse, RegisterRequest};
use super::models::media::{
    CancelRequest, ConversionRequest, InfoTaskResponse, JobStats, StreamRequest, SupportedFormats,
};

/// 普通 JSON 请求的超时
const JSON_TIMEOUT: Duration = Duration::from_secs(10);
/// 批量传输是阻塞到服务端抓完才回包的长请求，给足 10 分钟
const STREAM_TIMEOUT: Duration = Duration::from_secs(600);

/// 自动携带认证令牌的 MedKit API 客户端
///
/// 令牌来自磁盘上的 TokenStore；请求遇到 401 时用 refresh 令牌
/// 刷新一次并重试，仍失败才向上抛
#[derive(Clone)]
pub struct MedkitClient {
    inner: Client,
    base_url: String,
    tokens: Arc<TokenStore>,
}

impl MedkitClient {
    pub fn new(base_url: impl Into<String>, tokens: Arc<TokenStore>) -> Self {
        let inner = ClientBuilder::new()
            .timeout(JSON_TIMEOUT)
            .default_headers(Self::default_headers())
            .build()
            .expect("创建 HTTP 客户端失败");

        Self {
            inner,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
        }
    }

    fn default_headers() -> reqwest::header::HeaderMap {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(ACCEPT, reqwest::header::HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, reqwest::header::HeaderValue::from_static("medkit-client/0.1"));
        headers
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn auth_header(&self) -> Option<String> {
        self.tokens
            .access()
            .await
            .map(|token| format!("Bearer {}", token))
    }

    // 通用 GET
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let resp = self.send::<()>(Method::GET, path, None).await?;
        Self::handle_response(resp).await
    }

    // 通用 POST
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let resp = self.send(Method::POST, path, Some(body)).await?;
        Self::handle_response(resp).await
    }

    // 发送请求，401 时刷新令牌后原样重发一次
    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response, ApiError> {
        let mut resp = self.execute(method.clone(), path, body).await?;
        if resp.status() == StatusCode::UNAUTHORIZED && self.try_refresh().await? {
            resp = self.execute(method, path, body).await?;
        }
        Ok(resp)
    }

    async fn execute<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response, ApiError> {
        let mut request = self.inner.request(method, self.endpoint(path));
        if let Some(header) = self.auth_header().await {
            request = request.header(AUTHORIZATION, header);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    /// 用 refresh 令牌换新的访问令牌，成功返回 true
    async fn try_refresh(&self) -> Result<bool, ApiError> {
        let Some(refresh) = self.tokens.refresh().await else {
            return Ok(false);
        };

        let resp = self
            .inner
            .post(self.endpoint("/auth/token/refresh/"))
            .json(&RefreshRequest { refresh })
            .send()
            .await?;
        if !resp.status().is_success() {
            warn!("刷新访问令牌失败: {}", resp.status());
            return Ok(false);
        }

        let data: RefreshResponse = resp.json().await?;
        if let Err(err) = self.tokens.set_access(data.access).await {
            warn!("写入新令牌失败: {}", err);
        }
        Ok(true)
    }

    // 统一处理 JSON 响应
    async fn handle_response<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::AuthRequired);
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ApiError::HttpStatus(status.as_u16(), text));
        }
        resp.json::<T>()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    // ---- 认证 ----

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        self.post_json(
            "/auth/login/",
            &LoginRequest {
                email: email.to_string(),
                password: password.to_string(),
            },
        )
        .await
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<LoginResponse, ApiError> {
        self.post_json("/auth/register/", request).await
    }

    /// 通知服务端作废 refresh 令牌，失败只记日志
    pub async fn logout(&self) {
        let Some(refresh) = self.tokens.refresh().await else {
            return;
        };
        if let Err(err) = self
            .post_json::<_, serde_json::Value>("/auth/logout/", &RefreshRequest { refresh })
            .await
        {
            debug!("登出请求失败: {}", err);
        }
    }

    // ---- 下载 ----

    /// 发起视频信息提取任务，返回用于轮询的 task_id
    pub async fn start_video_info(&self, url: &str) -> Result<InfoTaskResponse, ApiError> {
        self.post_json("/downloads/video-info-progress/", &serde_json::json!({ "url": url }))
            .await
    }

    pub async fn get_info_progress(&self, task_id: &str) -> Result<ProgressReading, ApiError> {
        self.get_json(&format!(
            "/downloads/progress/{}/",
            urlencoding::encode(task_id)
        ))
        .await
    }

    pub async fn get_download_progress(
        &self,
        download_id: &str,
    ) -> Result<ProgressReading, ApiError> {
        self.get_json(&format!(
            "/downloads/download-progress/{}/",
            urlencoding::encode(download_id)
        ))
        .await
    }

    /// 批量传输：阻塞到服务端抓取完成，然后把成品文件流式返回
    pub async fn stream_download(&self, request: &StreamRequest) -> Result<Response, ApiError> {
        let mut builder = self
            .inner
            .post(self.endpoint("/downloads/stream/"))
            .timeout(STREAM_TIMEOUT)
            .json(request);
        if let Some(header) = self.auth_header().await {
            builder = builder.header(AUTHORIZATION, header);
        }

        let resp = builder.send().await?;
        if !resp.status().is_success() {
            return Err(ApiError::HttpStatus(
                resp.status().as_u16(),
                "批量传输请求被拒绝".to_string(),
            ));
        }
        Ok(resp)
    }

    /// 通知服务端取消任务，尽力而为，不阻塞调用方
    pub fn cancel_download(&self, download_id: &str) {
        let client = self.clone();
        let download_id = download_id.to_string();
        tokio::spawn(async move {
            let body = CancelRequest {
                download_id: download_id.clone(),
            };
            if let Err(err) = client
                .post_json::<_, serde_json::Value>("/downloads/cancel-download/", &body)
                .await
            {
                debug!("取消请求发送失败 ({}): {}", download_id, err);
            }
        });
    }

    pub async fn download_stats(&self) -> Result<JobStats, ApiError> {
        self.get_json("/downloads/stats/").await
    }

    // ---- 转换 ----

    /// 上传文件创建转换任务
    pub async fn create_conversion(
        &self,
        input: &Path,
        output_format: &str,
        quality: &str,
    ) -> Result<ConversionRequest, ApiError> {
        let data = tokio::fs::read(input).await?;
        let filename = input
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload.bin")
            .to_string();

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(data).file_name(filename),
            )
            .text("output_format", output_format.to_string())
            .text("quality", quality.to_string());

        let mut builder = self.inner.post(self.endpoint("/conversions/requests/"));
        if let Some(header) = self.auth_header().await {
            builder = builder.header(AUTHORIZATION, header);
        }
        let resp = builder.multipart(form).send().await?;
        Self::handle_response(resp).await
    }

    pub async fn get_conversion(&self, id: &str) -> Result<ConversionRequest, ApiError> {
        self.get_json(&format!(
            "/conversions/requests/{}/",
            urlencoding::encode(id)
        ))
        .await
    }

    pub async fn conversion_stats(&self) -> Result<JobStats, ApiError> {
        self.get_json("/conversions/stats/").await
    }

    pub async fn supported_formats(&self) -> Result<SupportedFormats, ApiError> {
        self.get_json("/conversions/supported-formats/").await
    }

    /// 拉取已完成的产物文件，download_url 可能是绝对地址或相对 API 根的路径
    pub async fn fetch_artifact(&self, url: &str) -> Result<Response, ApiError> {
        let absolute = if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            self.endpoint(url)
        };

        let mut builder = self.inner.get(absolute).timeout(STREAM_TIMEOUT);
        if let Some(header) = self.auth_header().await {
            builder = builder.header(AUTHORIZATION, header);
        }

        let resp = builder.send().await?;
        if !resp.status().is_success() {
            return Err(ApiError::HttpStatus(
                resp.status().as_u16(),
                "产物下载请求被拒绝".to_string(),
            ));
        }
        Ok(resp)
    }
}
