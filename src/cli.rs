use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// MedKit 媒体下载/转换客户端
#[derive(Parser, Debug)]
#[command(name = "medkit")]
#[command(version = "0.1")]
#[command(about = "MedKit 媒体下载/转换服务的命令行客户端", long_about = None)]
pub struct Cli {
    /// API 根地址 (默认读 MEDKIT_API_URL 环境变量)
    #[arg(long, value_name = "URL", global = true)]
    #[arg(value_hint = clap::ValueHint::Url)]
    pub api_base: Option<String>,

    /// 产物输出目录
    #[arg(long, value_name = "DIR", global = true)]
    #[arg(default_value = ".")]
    #[arg(value_hint = clap::ValueHint::DirPath)]
    pub output_dir: PathBuf,

    /// 令牌文件路径
    #[arg(long, value_name = "FILE", global = true)]
    #[arg(default_value = ".medkit_tokens.json")]
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub token_file: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// 登录 MedKit 账号
    Login {
        #[arg(long, value_name = "EMAIL")]
        email: String,

        #[arg(long, value_name = "PASSWORD")]
        password: String,
    },

    /// 注册新账号并直接登录
    Register {
        #[arg(long, value_name = "EMAIL")]
        email: String,

        #[arg(long, value_name = "PASSWORD")]
        password: String,

        #[arg(long, value_name = "NAME", default_value = "")]
        first_name: String,

        #[arg(long, value_name = "NAME", default_value = "")]
        last_name: String,
    },

    /// 退出登录
    Logout,

    /// 从 URL 下载媒体文件
    Download {
        /// 媒体链接，可一次给多个
        #[arg(value_name = "URL", required = true)]
        #[arg(value_hint = clap::ValueHint::Url)]
        urls: Vec<String>,

        /// 期望画质，如 1080p / 720p
        #[arg(long, value_name = "QUALITY")]
        quality: Option<String>,

        /// 只要音频 (MP3)
        #[arg(long, default_value_t = false)]
        audio_only: bool,
    },

    /// 转换本地媒体文件
    Convert {
        /// 待转换的文件
        #[arg(value_name = "FILE")]
        #[arg(value_hint = clap::ValueHint::FilePath)]
        input: PathBuf,

        /// 目标格式，如 mp4 / mp3 / webm
        #[arg(long = "to", value_name = "FORMAT")]
        output_format: String,

        /// 转换质量档位
        #[arg(long, value_name = "QUALITY", default_value = "medium")]
        quality: String,
    },

    /// 查看服务端的任务统计
    Stats,
}
