use clap::Parser;
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

mod auth;
mod cli;
mod common;
mod converter;
mod downloader;
mod parser;
mod progress;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

use auth::{AuthManager, TokenStore};
use cli::{Cli, Command};
use common::api::client::MedkitClient;
use common::api::models::auth::RegisterRequest;
use common::api::models::media::JobStats;
use common::config::ClientConfig;
use common::logger::PrettyLogger;
use converter::MediaConverter;
use downloader::{MediaDownloader, models::DownloadOptions};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Cli::parse();
    let config = ClientConfig::from_cli(&args);
    info!("API 地址: {}", config.api_base);

    let tokens = Arc::new(TokenStore::load(&config.token_file).await);
    let client = MedkitClient::new(&config.api_base, Arc::clone(&tokens));
    let auth_manager = AuthManager::new(client.clone(), Arc::clone(&tokens));

    match args.command {
        Command::Login { email, password } => {
            let user = auth_manager.login(&email, &password).await?;
            PrettyLogger::user_status("已登录", &user.email);
        }
        Command::Register {
            email,
            password,
            first_name,
            last_name,
        } => {
            let user = auth_manager
                .register(RegisterRequest {
                    email,
                    password,
                    first_name,
                    last_name,
                })
                .await?;
            PrettyLogger::user_status("已注册并登录", &user.email);
        }
        Command::Logout => {
            auth_manager.logout().await?;
            log_success!("已退出登录");
        }
        Command::Download {
            urls,
            quality,
            audio_only,
        } => {
            auth_manager.require_login().await?;
            run_download(&client, &config, urls, quality, audio_only).await?;
        }
        Command::Convert {
            input,
            output_format,
            quality,
        } => {
            auth_manager.require_login().await?;
            run_convert(&client, &config, &input, &output_format, &quality).await?;
        }
        Command::Stats => {
            auth_manager.require_login().await?;
            let downloads = client.download_stats().await?;
            let conversions = client.conversion_stats().await?;
            print_stats("下载任务", &downloads);
            print_stats("转换任务", &conversions);
        }
    }

    Ok(())
}

/// 下载一批 URL，失败的条目留在总结里，不自动重试
async fn run_download(
    client: &MedkitClient,
    config: &ClientConfig,
    urls: Vec<String>,
    quality: Option<String>,
    audio_only: bool,
) -> Result<()> {
    tokio::fs::create_dir_all(&config.output_dir).await?;
    let media_downloader = MediaDownloader::new(client.clone(), config.output_dir.clone());

    // Ctrl-C 时取消所有活跃任务：掐本地句柄 + 通知服务端
    {
        let media_downloader = media_downloader.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("收到中断信号，取消所有活跃任务");
                media_downloader.abort_all();
            }
        });
    }

    let options = DownloadOptions {
        quality,
        audio_only,
    };

    let mut summary: Vec<String> = Vec::new();
    let mut failures = 0usize;
    for url in urls {
        PrettyLogger::separator();
        match media_downloader.download(&url, &options).await {
            Ok(item) => {
                let path = item
                    .output_path
                    .as_ref()
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_default();
                summary.push(format!("{} {} -> {}", "✓".green(), item.title, path));
            }
            Err(err) => {
                failures += 1;
                log_error!("{}: {}", url, err);
                summary.push(format!("{} {} ({})", "✗".red(), url, err));
            }
        }
    }

    PrettyLogger::completion_summary(summary);
    if failures > 0 {
        log_warning!("{} 个任务未完成", failures);
    }
    Ok(())
}

async fn run_convert(
    client: &MedkitClient,
    config: &ClientConfig,
    input: &Path,
    output_format: &str,
    quality: &str,
) -> Result<()> {
    tokio::fs::create_dir_all(&config.output_dir).await?;
    let media_converter = MediaConverter::new(client.clone(), config.output_dir.clone());

    {
        let registry = media_converter.registry();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("收到中断信号，取消所有活跃任务");
                registry.cancel_all();
            }
        });
    }

    let path = media_converter
        .convert(input, output_format, quality)
        .await?;
    log_success!("转换完成: {}", path.display());
    Ok(())
}

fn print_stats(label: &str, stats: &JobStats) {
    PrettyLogger::title(label);
    PrettyLogger::job_status("总数", stats.total.to_string());
    PrettyLogger::job_status("排队中", stats.pending.to_string());
    PrettyLogger::job_status("进行中", stats.processing.to_string());
    PrettyLogger::job_status("已完成", stats.completed.to_string());
    PrettyLogger::job_status("已失败", stats.failed.to_string());
    PrettyLogger::job_status("已取消", stats.cancelled.to_string());
}
