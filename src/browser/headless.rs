use std::path::Path;

use anyhow::Result;
use chromiumoxide::{Browser, BrowserConfig, Page};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::spawn_event_loop;

/// 浏览器启动参数
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// 是否无头模式
    pub headless: bool,
    /// 自定义 Chrome 路径，None 时自动查找
    pub chrome_executable: Option<String>,
    /// 自定义 User-Agent
    pub user_agent: Option<String>,
}

/// 启动浏览器并打开一个空白页
///
/// 返回的 JoinHandle 是后台事件循环，关闭浏览器后应当 abort。
pub async fn launch_browser(options: &LaunchOptions) -> Result<(Browser, Page, JoinHandle<()>)> {
    info!(
        "🚀 启动浏览器 ({})...",
        if options.headless { "无头模式" } else { "界面模式" }
    );

    let mut builder = BrowserConfig::builder().window_size(1920, 1080);
    builder = if options.headless {
        builder.new_headless_mode()
    } else {
        builder.with_head()
    };
    if let Some(path) = options.chrome_executable.as_deref() {
        debug!("Chrome 路径: {}", path);
        builder = builder.chrome_executable(Path::new(path));
    }

    let mut args = vec![
        "--no-sandbox".to_string(),            // 无特权环境必须关闭沙盒
        "--disable-dev-shm-usage".to_string(), // 防止共享内存不足
        "--disable-gpu".to_string(),
        "--disable-extensions".to_string(),
    ];
    if let Some(ua) = options.user_agent.as_deref() {
        args.push(format!("--user-agent={}", ua));
    }

    let config = builder.args(args).build().map_err(|e| {
        error!("配置浏览器失败: {}", e);
        anyhow::anyhow!("配置浏览器失败: {}", e)
    })?;

    let (browser, handler) = Browser::launch(config).await.map_err(|e| {
        error!("启动浏览器失败: {}", e);
        anyhow::anyhow!("启动浏览器失败: {}", e)
    })?;
    debug!("浏览器启动成功");

    let handle = spawn_event_loop(handler).await;

    let page = browser.new_page("about:blank").await.map_err(|e| {
        error!("创建页面失败: {}", e);
        anyhow::anyhow!("创建页面失败: {}", e)
    })?;

    info!("✅ 浏览器已就绪");
    Ok((browser, page, handle))
}
