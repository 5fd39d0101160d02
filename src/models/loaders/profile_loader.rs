use crate::models::PortalProfile;
use anyhow::{Context, Result};
use phf::phf_map;
use std::path::Path;
use tokio::fs;

/// 内置门户配置
static BUILTIN_PROFILES: phf::Map<&'static str, &'static str> = phf_map! {
    "telcel" => include_str!("../../../profiles/telcel.toml"),
    "ift" => include_str!("../../../profiles/ift.toml"),
};

/// 按名称加载内置门户配置
pub fn builtin_profile(name: &str) -> Result<PortalProfile> {
    let content = BUILTIN_PROFILES
        .get(name)
        .with_context(|| format!("未知的门户: {} (可选: telcel, ift)", name))?;
    PortalProfile::from_toml_str(content).with_context(|| format!("内置门户配置无效: {}", name))
}

/// 从 TOML 文件加载门户配置
pub async fn load_profile_file(toml_file_path: &Path) -> Result<PortalProfile> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取TOML文件: {}", toml_file_path.display()))?;

    PortalProfile::from_toml_str(&content)
        .with_context(|| format!("无法解析TOML文件: {}", toml_file_path.display()))
}
