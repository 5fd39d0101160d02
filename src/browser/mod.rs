pub mod connection;
pub mod headless;

pub use connection::connect_to_browser;
pub use headless::{launch_browser, LaunchOptions};

use chromiumoxide::Handler;
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// 浏览器事件循环启动后的同步等待
const HANDLER_SETTLE: Duration = Duration::from_millis(300);

/// 在后台处理浏览器事件，直到连接断开
///
/// 单个事件出错（例如无法解析的事件）不结束循环，否则之后的关闭命令都发不出去。
async fn spawn_event_loop(mut handler: Handler) -> JoinHandle<()> {
    let handle = tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                debug!("浏览器事件处理出错: {}", e);
            }
        }
        debug!("浏览器连接已断开");
    });
    // 等待浏览器状态同步
    tokio::time::sleep(HANDLER_SETTLE).await;
    handle
}
