//! 命令行参数
//!
//! 命令行只覆盖显式给出的项，其余沿用环境变量和默认值（`Config::from_env`）。

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PortalKind {
    /// Telcel 支付门户
    Telcel,
    /// IFT 号码归属查询
    Ift,
}

impl PortalKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PortalKind::Telcel => "telcel",
            PortalKind::Ift => "ift",
        }
    }
}

fn parse_secs(raw: &str) -> Result<Duration, String> {
    let secs: f64 = raw.parse().map_err(|_| format!("不是有效的秒数: {}", raw))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("无效的秒数 {}: {}", raw, e))
}

#[derive(Debug, Parser)]
#[command(name = "phone-status-scraper", version)]
#[command(about = "批量查询手机号码在 Telcel / IFT 门户上的状态")]
pub struct Cli {
    /// 目标门户
    #[arg(long, value_enum)]
    pub portal: Option<PortalKind>,
    /// 显示浏览器窗口
    #[arg(long)]
    pub no_headless: bool,
    /// 单步等待超时（秒，默认 20）
    #[arg(long, value_parser = parse_secs)]
    pub timeout: Option<Duration>,
    /// 识别结果的总超时（秒，默认 20）
    #[arg(long, value_parser = parse_secs)]
    pub result_timeout: Option<Duration>,
    /// 识别结果的轮询间隔（秒，默认 0.5）
    #[arg(long, value_parser = parse_secs)]
    pub result_poll: Option<Duration>,
    /// 重置后的等待时间（秒，默认取门户配置）
    #[arg(long, value_parser = parse_secs)]
    pub settle: Option<Duration>,
    /// 输出更详细的日志（-v 为 debug）
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
    /// 只输出警告和错误
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
    /// 输入号码 CSV（不提供时只做导航检查）
    #[arg(long)]
    pub csv: Option<PathBuf>,
    /// 结果 CSV
    #[arg(long)]
    pub output: Option<PathBuf>,
    /// status.json / index.html 输出目录
    #[arg(long)]
    pub status_dir: Option<PathBuf>,
    /// 门户配置文件（TOML），覆盖内置配置
    #[arg(long)]
    pub profile: Option<PathBuf>,
    /// 日志目录
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
    /// 连接已启动浏览器的调试端口
    #[arg(long)]
    pub debug_port: Option<u16>,
    /// Chrome 可执行文件路径
    #[arg(long)]
    pub chrome: Option<String>,
    /// 请求方邮箱（写入进度快照）
    #[arg(long)]
    pub email_from: Option<String>,
    /// 请求邮件主题（写入进度快照）
    #[arg(long)]
    pub email_subject: Option<String>,
    /// 上传进度的 S3 存储桶
    #[arg(long)]
    pub bucket: Option<String>,
}

impl Cli {
    /// 把命令行参数覆盖到配置上
    pub fn apply(self, config: &mut Config) {
        if let Some(portal) = self.portal {
            config.portal = portal.as_str().to_string();
        }
        if self.no_headless {
            config.headless = false;
        }
        if let Some(timeout) = self.timeout {
            config.step_timeout = timeout;
        }
        if let Some(timeout) = self.result_timeout {
            config.result_timeout = timeout;
        }
        if let Some(poll) = self.result_poll {
            config.result_poll = poll;
        }
        if self.settle.is_some() {
            config.settle = self.settle;
        }
        config.verbosity = if self.quiet { 0 } else { 1 + self.verbose };
        if self.csv.is_some() {
            config.input_csv = self.csv;
        }
        if let Some(output) = self.output {
            config.output_csv = output;
        }
        if let Some(dir) = self.status_dir {
            config.status_dir = dir;
        }
        if self.profile.is_some() {
            config.profile_path = self.profile;
        }
        if let Some(dir) = self.log_dir {
            config.log_dir = dir;
        }
        if self.debug_port.is_some() {
            config.browser_debug_port = self.debug_port;
        }
        if self.chrome.is_some() {
            config.chrome_executable = self.chrome;
        }
        if let Some(from) = self.email_from {
            config.run.email_from = from;
        }
        if let Some(subject) = self.email_subject {
            config.run.email_subject = subject;
        }
        if let Some(bucket) = self.bucket {
            config.run.bucket = Some(bucket);
        }
    }
}
