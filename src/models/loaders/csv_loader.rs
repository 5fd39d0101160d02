use crate::models::Item;
use anyhow::{Context, Result};
use regex::Regex;
use std::path::Path;
use tokio::fs;

/// 号码列的表头（忽略大小写）
const PHONE_COLUMN: &str = "telefono";
/// 可识别的分隔符
const DELIMITERS: [u8; 4] = [b',', b';', b'\t', b'|'];

/// 从 CSV 文件读取待处理的号码
pub async fn read_numbers(csv_path: &Path) -> Result<Vec<Item>> {
    let bytes = fs::read(csv_path)
        .await
        .with_context(|| format!("无法读取CSV文件: {}", csv_path.display()))?;
    let content = String::from_utf8(bytes)
        .with_context(|| format!("CSV文件不是有效的 UTF-8: {}", csv_path.display()))?;

    let items = parse_numbers(&content)
        .with_context(|| format!("无法解析CSV文件: {}", csv_path.display()))?;
    tracing::info!("从 {} 读取到 {} 个号码", csv_path.display(), items.len());
    Ok(items)
}

/// 解析 CSV 文本
///
/// - 第一行是表头，`telefono` 列匹配忽略大小写，找不到时使用第一列
/// - 空值跳过，值去掉首尾空白
/// - 兼容 BOM，分隔符从表头行推断
pub fn parse_numbers(content: &str) -> Result<Vec<Item>> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let delimiter = sniff_delimiter(content);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = reader.headers().context("无法读取CSV表头")?.clone();
    let column = headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(PHONE_COLUMN))
        .unwrap_or_else(|| {
            tracing::warn!("未找到 '{}' 列，使用第一列", PHONE_COLUMN);
            0
        });

    let phone_pattern = Regex::new(r"^\+?\d{8,15}$")?;
    let mut items = Vec::new();

    for (index, record) in reader.records().enumerate() {
        let line = index + 2;
        let record = record.with_context(|| format!("CSV第 {} 行格式错误", line))?;
        let Some(value) = record.get(column) else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        if !phone_pattern.is_match(value) {
            tracing::warn!("第 {} 行的值不像电话号码，仍然处理: {}", line, value);
        }
        items.push(Item::new(value));
    }

    Ok(items)
}

/// 从表头行推断分隔符，默认逗号
fn sniff_delimiter(content: &str) -> u8 {
    let header = content.lines().next().unwrap_or_default();
    DELIMITERS
        .iter()
        .copied()
        .map(|d| (d, header.bytes().filter(|b| *b == d).count()))
        .filter(|(_, count)| *count > 0)
        .max_by_key(|(_, count)| *count)
        .map(|(d, _)| d)
        .unwrap_or(b',')
}
