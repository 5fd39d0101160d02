//! 门户层
//!
//! 每个门户只描述自己页面上的步骤（打开、准备、提交、收尾、重置），
//! 状态机和结果识别对所有门户相同。

pub mod ift;
pub mod telcel;

use async_trait::async_trait;
use std::path::Path;

use crate::error::StepResult;
use crate::infrastructure::Session;
use crate::models::PortalProfile;
use crate::services::ElementWaiter;
use crate::workflow::ItemCtx;

pub use ift::IftPortal;
pub use telcel::TelcelPortal;

/// 门户步骤
#[async_trait]
pub trait Portal: Send + Sync {
    fn profile(&self) -> &PortalProfile;

    fn start_url(&self) -> &str {
        &self.profile().start_url
    }

    /// 打开门户首页
    async fn open(&self, session: &dyn Session) -> StepResult<()>;

    /// Idle → Submitting：定位输入框和操作按钮
    async fn prepare(&self, session: &dyn Session, ctx: &ItemCtx) -> StepResult<()>;

    /// Submitting → AwaitingResult：输入号码并提交
    async fn submit(&self, session: &dyn Session, ctx: &ItemCtx) -> StepResult<()>;

    /// 识别出结果之后的收尾
    async fn finish(&self, _session: &dyn Session, _ctx: &ItemCtx) -> StepResult<()> {
        Ok(())
    }

    /// 回到起始页面
    async fn reset(&self, session: &dyn Session) -> StepResult<()> {
        session.goto(self.start_url()).await
    }

    /// 没有输入文件时的导航检查
    async fn check_navigation(&self, session: &dyn Session) -> StepResult<()> {
        self.open(session).await
    }
}

/// 按名称创建门户
///
/// `debug_dir` 用于保存页面加载失败时的 HTML。
pub fn create_portal(
    profile: PortalProfile,
    waiter: ElementWaiter,
    debug_dir: &Path,
) -> anyhow::Result<Box<dyn Portal>> {
    match profile.name.as_str() {
        "telcel" => Ok(Box::new(TelcelPortal::new(profile, waiter)?.with_debug_dir(debug_dir))),
        "ift" => Ok(Box::new(IftPortal::new(profile, waiter)?)),
        other => anyhow::bail!("不支持的门户: {}", other),
    }
}
