use anyhow::Result;
/// 日志工具模块
///
/// 提供日志文件准备、格式化和统计输出的辅助函数
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::Config;
use crate::models::BatchProgress;

/// 单个日志文件的最大大小
const MAX_LOG_BYTES: u64 = 5 * 1024 * 1024;
/// 保留的历史日志数量
const MAX_LOG_BACKUPS: usize = 3;

fn backup_path(path: &Path, n: usize) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{}", n));
    PathBuf::from(name)
}

/// 日志超过上限时轮转：scraper.log → scraper.log.1 → ... → scraper.log.3
pub fn rotate_if_needed(log_file_path: &Path) -> Result<bool> {
    let size = match fs::metadata(log_file_path) {
        Ok(meta) => meta.len(),
        Err(_) => return Ok(false),
    };
    if size < MAX_LOG_BYTES {
        return Ok(false);
    }

    for n in (1..MAX_LOG_BACKUPS).rev() {
        let from = backup_path(log_file_path, n);
        if from.exists() {
            fs::rename(&from, backup_path(log_file_path, n + 1))?;
        }
    }
    fs::rename(log_file_path, backup_path(log_file_path, 1))?;
    Ok(true)
}

/// 准备日志文件：创建目录、按需轮转、写入本次运行的分隔头
pub fn prepare_log_file(log_file_path: &Path) -> Result<()> {
    if let Some(parent) = log_file_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    rotate_if_needed(log_file_path)?;

    let log_header = format!(
        "\n{}\n号码批量查询日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)?;
    file.write_all(log_header.as_bytes())?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config, display_name: &str) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - {}", display_name);
    info!(
        "🌐 浏览器: {}",
        match config.browser_debug_port {
            Some(port) => format!("连接调试端口 {}", port),
            None if config.headless => "无头模式".to_string(),
            None => "可视模式".to_string(),
        }
    );
    info!(
        "⏱️ 单步超时 {:?}，结果超时 {:?}，轮询 {:?}",
        config.step_timeout, config.result_timeout, config.result_poll
    );
    info!("{}", "=".repeat(60));
}

/// 记录号码加载信息
pub fn log_items_loaded(total: usize, source: &Path, output: &Path) {
    info!("✓ 从 {} 读取到 {} 个待处理的号码", source.display(), total);
    info!("📋 结果写入: {}", output.display());
}

/// 打印最终统计信息
pub fn print_final_stats(progress: &BatchProgress, results_path: &Path, log_file_path: Option<&Path>) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("📦 状态: {}", progress.status.as_str());
    info!(
        "✅ 已处理: {}/{} ({:.2}s/号码)",
        progress.processed,
        progress.total,
        progress.mean_seconds()
    );
    info!("❌ 失败: {}", progress.failures);
    for (status, count) in &progress.by_status {
        info!("   {}: {}", status, count);
    }
    info!("{}", "=".repeat(60));
    info!("结果已保存至: {}", results_path.display());
    if let Some(path) = log_file_path {
        info!("日志已保存至: {}", path.display());
    }
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_by_chars() {
        assert_eq!(truncate_text("Proveedor", 4), "Prov...");
        assert_eq!(truncate_text("número", 10), "número");
    }

    #[test]
    fn header_is_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("scraper.log");
        prepare_log_file(&path).unwrap();
        prepare_log_file(&path).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("号码批量查询日志").count(), 2);
    }

    #[test]
    fn large_log_is_rotated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scraper.log");
        fs::write(&path, vec![b'x'; MAX_LOG_BYTES as usize]).unwrap();
        fs::write(backup_path(&path, 1), "old").unwrap();

        assert!(rotate_if_needed(&path).unwrap());
        assert!(!path.exists());
        assert_eq!(fs::read_to_string(backup_path(&path, 2)).unwrap(), "old");
        assert_eq!(
            fs::metadata(backup_path(&path, 1)).unwrap().len(),
            MAX_LOG_BYTES
        );
        assert!(!rotate_if_needed(&path).unwrap());
    }
}
