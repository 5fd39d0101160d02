//! Telcel 支付门户
//!
//! 每个号码都从首页开始：关闭弹窗 → 点击 "Pagar" → 等待带 token 的支付页 →
//! 填写号码并提交。结果由识别器轮询页面得出。

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::{StepError, StepResult};
use crate::infrastructure::{Selector, Session};
use crate::models::PortalProfile;
use crate::portals::Portal;
use crate::services::{Condition, ElementWaiter};
use crate::workflow::ItemCtx;

const POPUP_ANIMATION: Duration = Duration::from_millis(500);
const PAY_BUTTON_MAX_WAIT: Duration = Duration::from_secs(5);
const DEBUG_PAGE_FILE: &str = "debug_payment_page.html";

/// 点击 "Pagar" 的备选方式，按顺序尝试
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PayStrategy {
    /// 首页配置的选择器
    Selector,
    /// 首页卡片按钮中的第 N 个
    CardIndex,
    /// 任意文本包含 "pagar" 的按钮
    ButtonText,
}

const PAY_STRATEGIES: [PayStrategy; 3] = [
    PayStrategy::Selector,
    PayStrategy::CardIndex,
    PayStrategy::ButtonText,
];

pub struct TelcelPortal {
    profile: PortalProfile,
    waiter: ElementWaiter,
    popup_close: Selector,
    pay_button: Selector,
    input: Selector,
    submit: Selector,
    payment_path: String,
    card_selector: String,
    card_index: usize,
    debug_dir: Option<PathBuf>,
}

impl TelcelPortal {
    pub fn new(profile: PortalProfile, waiter: ElementWaiter) -> anyhow::Result<Self> {
        Ok(Self {
            popup_close: profile.selector("popup_close")?,
            pay_button: profile.selector("pay_button_home")?,
            input: profile.selector("input_number")?,
            submit: profile.selector("submit_number")?,
            payment_path: profile.setting("payment_path").unwrap_or("/ps/home/").to_string(),
            card_selector: profile
                .setting("home_card_button")
                .unwrap_or("button.tc-home__card-button")
                .to_string(),
            card_index: profile
                .setting("home_card_index")
                .and_then(|v| v.parse().ok())
                .unwrap_or(2),
            debug_dir: None,
            profile,
            waiter,
        })
    }

    /// 支付页加载超时时把页面 HTML 保存到该目录
    pub fn with_debug_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.debug_dir = Some(dir.into());
        self
    }

    /// 关闭首页弹窗，没有弹窗不算错误
    async fn close_popup(&self, session: &dyn Session) -> StepResult<bool> {
        debug!("查找弹窗: {}", self.popup_close);
        let Some(button) = self
            .waiter
            .find(session, &self.popup_close, &Condition::Clickable)
            .await?
        else {
            debug!("{:?} 内没有弹窗", self.waiter.timeout());
            return Ok(false);
        };

        match session.click(button.scope, &button.selector).await {
            Ok(()) => {
                sleep(POPUP_ANIMATION).await;
                debug!("弹窗已关闭");
                Ok(true)
            }
            Err(e) if e.is_session() => Err(e),
            Err(e) => {
                warn!("关闭弹窗失败: {}", e);
                Ok(false)
            }
        }
    }

    /// 点击首页的 "Pagar" 并等待 URL 变化，返回新 URL
    async fn click_pay_button(&self, session: &dyn Session) -> StepResult<String> {
        let original_url = session.current_url().await?;

        for (i, strategy) in PAY_STRATEGIES.iter().enumerate() {
            match self.try_pay_strategy(session, *strategy).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!("方式 #{} 没有找到按钮", i + 1);
                    continue;
                }
                Err(e) if e.is_session() => return Err(e),
                Err(e) => {
                    debug!("方式 #{} 失败: {}", i + 1, e);
                    continue;
                }
            }

            debug!("方式 #{} 已点击，等待导航...", i + 1);
            match self
                .waiter
                .wait_for_url(session, |url| url != original_url, "首页跳转")
                .await
            {
                Ok(new_url) => {
                    debug!("检测到导航: {}", new_url);
                    return Ok(new_url);
                }
                Err(e) if e.is_session() => return Err(e),
                Err(e) => debug!("方式 #{} 点击后没有导航: {}", i + 1, e),
            }
        }

        Err(StepError::ElementNotReady {
            what: "首页的 Pagar 按钮（所有方式均失败）".to_string(),
        })
    }

    async fn try_pay_strategy(&self, session: &dyn Session, strategy: PayStrategy) -> StepResult<bool> {
        match strategy {
            PayStrategy::Selector => {
                let waiter = self
                    .waiter
                    .with_timeout(self.waiter.timeout().min(PAY_BUTTON_MAX_WAIT));
                match waiter.find(session, &self.pay_button, &Condition::Clickable).await? {
                    Some(button) => {
                        session.click(button.scope, &button.selector).await?;
                        Ok(true)
                    }
                    None => Ok(false),
                }
            }
            PayStrategy::CardIndex => {
                let script = format!(
                    r#"(() => {{
                        const button = document.querySelectorAll({selector})[{index}];
                        if (!button) return false;
                        button.scrollIntoView(true);
                        button.click();
                        return true;
                    }})()"#,
                    selector = serde_json::to_string(&self.card_selector)?,
                    index = self.card_index,
                );
                Ok(session.evaluate(&script).await?.as_bool().unwrap_or(false))
            }
            PayStrategy::ButtonText => {
                let script = r#"(() => {
                    const button = Array.from(document.querySelectorAll('button'))
                        .find(b => b.textContent && b.textContent.trim().toLowerCase().includes('pagar'));
                    if (!button) return false;
                    button.scrollIntoView(true);
                    button.click();
                    return true;
                })()"#;
                Ok(session.evaluate(script).await?.as_bool().unwrap_or(false))
            }
        }
    }

    /// 等待带 token 的支付页
    async fn wait_for_payment_page(&self, session: &dyn Session) -> StepResult<String> {
        let path = self.payment_path.as_str();
        match self
            .waiter
            .wait_for_url(session, |url| url.contains(path), "支付页")
            .await
        {
            Ok(url) => {
                debug!("支付页已加载: {}", url);
                Ok(url)
            }
            Err(e) => {
                if !e.is_session() {
                    self.dump_page(session).await;
                }
                Err(e)
            }
        }
    }

    async fn dump_page(&self, session: &dyn Session) {
        let Some(dir) = &self.debug_dir else {
            return;
        };
        let html = match session.evaluate("document.documentElement.outerHTML").await {
            Ok(value) => value.as_str().unwrap_or_default().to_string(),
            Err(e) => {
                warn!("无法读取页面 HTML: {}", e);
                return;
            }
        };
        let path = dir.join(DEBUG_PAGE_FILE);
        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            warn!("无法创建调试目录 {}: {}", dir.display(), e);
            return;
        }
        match tokio::fs::write(&path, html).await {
            Ok(()) => info!("当前页面 HTML 已保存到 {}", path.display()),
            Err(e) => warn!("无法保存调试页面: {}", e),
        }
    }
}

#[async_trait]
impl Portal for TelcelPortal {
    fn profile(&self) -> &PortalProfile {
        &self.profile
    }

    async fn open(&self, session: &dyn Session) -> StepResult<()> {
        debug!("打开首页: {}", self.start_url());
        session.goto(self.start_url()).await?;
        self.close_popup(session).await?;
        Ok(())
    }

    async fn prepare(&self, session: &dyn Session, ctx: &ItemCtx) -> StepResult<()> {
        self.open(session).await?;
        let new_url = self.click_pay_button(session).await?;
        debug!("{} 首页跳转到 {}", ctx, new_url);
        self.wait_for_payment_page(session).await?;

        self.waiter
            .require(session, &self.input, &Condition::Present, "号码输入框")
            .await?;
        self.waiter
            .require(session, &self.submit, &Condition::Present, "提交按钮")
            .await?;
        Ok(())
    }

    async fn submit(&self, session: &dyn Session, ctx: &ItemCtx) -> StepResult<()> {
        let input = self
            .waiter
            .require(session, &self.input, &Condition::Present, "号码输入框")
            .await?;
        session.fill(input.scope, &input.selector, ctx.item.as_str()).await?;
        debug!("{} 已填写号码", ctx);

        let submit = self
            .waiter
            .require(session, &self.submit, &Condition::Present, "提交按钮")
            .await?;
        session.click(submit.scope, &submit.selector).await?;
        debug!("{} 已提交", ctx);
        Ok(())
    }

    async fn check_navigation(&self, session: &dyn Session) -> StepResult<()> {
        self.open(session).await?;
        let new_url = self.click_pay_button(session).await?;
        info!("导航检查完成: {}", new_url);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::infrastructure::scripted::{ClickEffect, ScriptedSession};
    use crate::infrastructure::{DocumentScope, ElementState};
    use crate::models::{builtin_profile, Item};

    pub const PAYMENT_URL: &str = "https://padnet.telcel.com/ps/home/abc123";

    pub fn portal() -> TelcelPortal {
        TelcelPortal::new(
            builtin_profile("telcel").unwrap(),
            ElementWaiter::new(Duration::from_millis(60), Duration::from_millis(5)),
        )
        .unwrap()
    }

    /// 首页 → 支付页 → 提交后显示金额
    pub fn happy_session() -> ScriptedSession {
        let portal = portal();
        let session = ScriptedSession::new("about:blank");
        session.put(DocumentScope::Main, portal.pay_button.clone(), ElementState::visible("Pagar"));
        session.on_click(
            portal.pay_button.clone(),
            ClickEffect {
                navigate: Some(PAYMENT_URL.into()),
                insert: vec![
                    (DocumentScope::Frame(0), portal.input.clone(), ElementState::visible("")),
                    (DocumentScope::Frame(0), portal.submit.clone(), ElementState::visible("Pagar")),
                ],
                ..Default::default()
            },
        );
        session.set_frames(1);
        session.on_click(
            portal.submit.clone(),
            ClickEffect {
                insert: vec![(
                    DocumentScope::Frame(0),
                    Selector::css("p[data-testid='qa_success_amount']"),
                    ElementState::visible("$150.00"),
                )],
                ..Default::default()
            },
        );
        session
    }

    fn ctx() -> ItemCtx {
        ItemCtx::new(Item::new("5512345678"), 1, 1)
    }

    #[tokio::test]
    async fn prepare_reaches_payment_form_inside_frame() {
        let portal = portal();
        let session = happy_session();
        portal.prepare(&session, &ctx()).await.unwrap();

        assert_eq!(session.gotos.lock().unwrap()[0], "https://padnet.telcel.com/portal/");
        assert_eq!(session.current_url().await.unwrap(), PAYMENT_URL);
    }

    #[tokio::test]
    async fn submit_fills_number_and_clicks() {
        let portal = portal();
        let session = happy_session();
        portal.prepare(&session, &ctx()).await.unwrap();
        portal.submit(&session, &ctx()).await.unwrap();

        let fills = session.fills.lock().unwrap();
        assert_eq!(fills[0], (portal.input.clone(), "5512345678".to_string()));
        assert_eq!(session.clicks.lock().unwrap().last(), Some(&portal.submit));
    }

    #[tokio::test]
    async fn popup_is_closed_when_present() {
        let portal = portal();
        let session = happy_session();
        session.put(DocumentScope::Main, portal.popup_close.clone(), ElementState::visible("x"));
        session.on_click(
            portal.popup_close.clone(),
            ClickEffect {
                remove: vec![(DocumentScope::Main, portal.popup_close.clone())],
                ..Default::default()
            },
        );

        portal.open(&session).await.unwrap();
        assert_eq!(session.clicks.lock().unwrap()[0], portal.popup_close);
    }

    #[tokio::test]
    async fn missing_pay_button_is_not_ready() {
        let portal = portal();
        let session = ScriptedSession::new("about:blank");
        let err = portal.prepare(&session, &ctx()).await.unwrap_err();
        assert!(matches!(err, StepError::ElementNotReady { .. }));
    }

    #[tokio::test]
    async fn script_fallback_is_used_when_selector_fails() {
        let portal = portal();
        let session = ScriptedSession::new("https://padnet.telcel.com/portal/");
        // 脚本点击成功，但页面没有跳转
        session.set_evaluate_result(serde_json::Value::Bool(true));
        let err = portal.check_navigation(&session).await.unwrap_err();
        assert!(matches!(err, StepError::ElementNotReady { .. }));
    }

    #[tokio::test]
    async fn payment_page_timeout_dumps_html() {
        let dir = tempfile::tempdir().unwrap();
        let portal = portal().with_debug_dir(dir.path());
        let session = ScriptedSession::new("https://padnet.telcel.com/portal/");
        session.set_evaluate_result(serde_json::Value::String("<html></html>".into()));

        let err = portal.wait_for_payment_page(&session).await.unwrap_err();
        assert!(matches!(err, StepError::Timeout { .. }));
        assert!(dir.path().join(DEBUG_PAGE_FILE).exists());
    }
}
