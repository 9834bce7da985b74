use std::path::PathBuf;

use crate::cli::Cli;

/// API 根地址的环境变量名
pub const API_BASE_ENV: &str = "MEDKIT_API_URL";
const DEFAULT_API_BASE: &str = "http://localhost:8000/api";

/// 客户端运行配置，来自命令行参数与环境变量
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API 根地址，形如 http://localhost:8000/api
    pub api_base: String,
    /// 下载/转换产物的输出目录
    pub output_dir: PathBuf,
    /// 令牌文件路径，浏览器端 localStorage 的等价物
    pub token_file: PathBuf,
}

impl ClientConfig {
    /// 优先级：命令行参数 > 环境变量 > 默认值
    pub fn from_cli(args: &Cli) -> Self {
        let api_base = args
            .api_base
            .clone()
            .or_else(|| std::env::var(API_BASE_ENV).ok())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            output_dir: args.output_dir.clone(),
            token_file: args.token_file.clone(),
        }
    }
}
