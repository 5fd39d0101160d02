//! 日志初始化
//!
//! 同时输出到 stderr 和日志文件。`RUST_LOG` 优先，否则按 `-v` 次数决定级别。

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::utils::logging::prepare_log_file;

fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

fn open_log_file(path: &Path) -> Result<std::fs::File> {
    prepare_log_file(path)?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("无法打开日志文件: {}", path.display()))
}

/// 初始化全局日志
///
/// `log_file` 为 None 时只输出到 stderr；日志文件无法打开时同样只输出到 stderr。
pub fn init(verbosity: u8, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,{}={}",
            env!("CARGO_CRATE_NAME"),
            level_for(verbosity)
        ))
    });

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbosity >= 2);

    let (file, file_error) = match log_file.map(open_log_file) {
        Some(Ok(file)) => (Some(file), None),
        Some(Err(e)) => (None, Some(e)),
        None => (None, None),
    };
    let file_layer = file.map(|file| fmt::layer().with_ansi(false).with_writer(Mutex::new(file)));

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("日志已经初始化")?;

    if let Some(e) = file_error {
        tracing::warn!("⚠️ 日志文件不可用，只输出到终端: {:#}", e);
    }
    Ok(())
}
