//! IFT 号码归属查询门户
//!
//! 同一个查询页面反复使用：输入号码 → 等待"查询"按钮可用 → 点击 →
//! 等待结果表格 → 读取运营商 → 清空表单。

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

use crate::error::StepResult;
use crate::infrastructure::{Selector, Session};
use crate::models::PortalProfile;
use crate::portals::Portal;
use crate::services::{Condition, ElementWaiter};
use crate::workflow::ItemCtx;

pub struct IftPortal {
    profile: PortalProfile,
    waiter: ElementWaiter,
    input: Selector,
    search_button: Selector,
    clear_button: Selector,
    result_table: Selector,
    disabled_class: String,
    enable_wait: Duration,
    clear_wait: Duration,
    after_clear_pause: Duration,
}

impl IftPortal {
    pub fn new(profile: PortalProfile, waiter: ElementWaiter) -> anyhow::Result<Self> {
        Ok(Self {
            input: profile.selector("input")?,
            search_button: profile.selector("search_button")?,
            clear_button: profile.selector("clear_button")?,
            result_table: profile.selector("result_table")?,
            disabled_class: profile
                .setting("disabled_class")
                .unwrap_or("ui-state-disabled")
                .to_string(),
            enable_wait: profile.setting_secs("enable_wait_secs", 15.0),
            clear_wait: profile.setting_secs("clear_wait_secs", 10.0),
            after_clear_pause: profile.setting_secs("after_clear_pause_secs", 2.0),
            profile,
            waiter,
        })
    }

    async fn at_start_page(&self, session: &dyn Session) -> StepResult<bool> {
        let url = session.current_url().await?;
        Ok(url.trim_end_matches('/') == self.start_url().trim_end_matches('/'))
    }
}

#[async_trait]
impl Portal for IftPortal {
    fn profile(&self) -> &PortalProfile {
        &self.profile
    }

    async fn open(&self, session: &dyn Session) -> StepResult<()> {
        debug!("打开查询页: {}", self.start_url());
        session.goto(self.start_url()).await?;
        self.waiter
            .require(session, &self.input, &Condition::Clickable, "号码输入框")
            .await?;
        Ok(())
    }

    async fn prepare(&self, session: &dyn Session, _ctx: &ItemCtx) -> StepResult<()> {
        if !self.at_start_page(session).await? {
            session.goto(self.start_url()).await?;
        }
        self.waiter
            .require(session, &self.input, &Condition::Clickable, "号码输入框")
            .await?;
        Ok(())
    }

    async fn submit(&self, session: &dyn Session, ctx: &ItemCtx) -> StepResult<()> {
        let input = self
            .waiter
            .require(session, &self.input, &Condition::Clickable, "号码输入框")
            .await?;
        session.fill(input.scope, &input.selector, ctx.item.as_str()).await?;

        let search = self
            .waiter
            .with_timeout(self.enable_wait)
            .require_enabled(session, &self.search_button, &self.disabled_class, "查询按钮")
            .await?;
        session.click(search.scope, &search.selector).await?;
        debug!("{} 已提交查询", ctx);

        self.waiter
            .require(session, &self.result_table, &Condition::Visible, "结果表格")
            .await?;
        Ok(())
    }

    async fn finish(&self, session: &dyn Session, ctx: &ItemCtx) -> StepResult<()> {
        let clear = self
            .waiter
            .with_timeout(self.enable_wait)
            .require_enabled(session, &self.clear_button, &self.disabled_class, "清空按钮")
            .await?;
        session.click(clear.scope, &clear.selector).await?;

        let gone = self
            .waiter
            .with_timeout(self.clear_wait)
            .wait_until_gone(session, &self.result_table)
            .await?;
        if !gone {
            debug!("{} 清空后结果表格仍然可见", ctx);
        }
        sleep(self.after_clear_pause).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StepError;
    use crate::infrastructure::scripted::{ClickEffect, ScriptedSession};
    use crate::infrastructure::{DocumentScope, ElementState};
    use crate::models::{builtin_profile, Item};

    fn portal() -> IftPortal {
        let mut profile = builtin_profile("ift").unwrap();
        profile.settings.insert("enable_wait_secs".into(), "0.06".into());
        profile.settings.insert("clear_wait_secs".into(), "0.06".into());
        profile.settings.insert("after_clear_pause_secs".into(), "0".into());
        IftPortal::new(
            profile,
            ElementWaiter::new(Duration::from_millis(60), Duration::from_millis(5)),
        )
        .unwrap()
    }

    fn enabled() -> ElementState {
        ElementState::visible("")
    }

    fn session_at_start(portal: &IftPortal) -> ScriptedSession {
        let session = ScriptedSession::new(portal.start_url());
        session.put(DocumentScope::Main, portal.input.clone(), enabled());
        session.put(DocumentScope::Main, portal.search_button.clone(), enabled());
        session
    }

    fn ctx() -> ItemCtx {
        ItemCtx::new(Item::new("5512345678"), 1, 1)
    }

    #[tokio::test]
    async fn submit_waits_for_result_table() {
        let portal = portal();
        let session = session_at_start(&portal);
        session.on_click(
            portal.search_button.clone(),
            ClickEffect {
                insert: vec![(DocumentScope::Main, portal.result_table.clone(), ElementState::visible("tabla"))],
                ..Default::default()
            },
        );

        portal.prepare(&session, &ctx()).await.unwrap();
        portal.submit(&session, &ctx()).await.unwrap();
        assert_eq!(session.fills.lock().unwrap()[0].1, "5512345678");
        // 已在查询页，不重新导航
        assert_eq!(session.goto_count(), 0);
    }

    #[tokio::test]
    async fn disabled_search_button_is_not_ready() {
        let portal = portal();
        let session = session_at_start(&portal);
        session.put(
            DocumentScope::Main,
            portal.search_button.clone(),
            ElementState {
                visible: true,
                class_name: "ui-button ui-state-disabled".into(),
                aria_disabled: Some("true".into()),
                ..Default::default()
            },
        );

        let err = portal.submit(&session, &ctx()).await.unwrap_err();
        assert!(matches!(err, StepError::ElementNotReady { .. }));
    }

    #[tokio::test]
    async fn missing_table_times_out() {
        let portal = portal();
        let session = session_at_start(&portal);
        let err = portal.submit(&session, &ctx()).await.unwrap_err();
        assert!(matches!(err, StepError::Timeout { .. }));
    }

    #[tokio::test]
    async fn finish_clears_the_form() {
        let portal = portal();
        let session = session_at_start(&portal);
        session.put(DocumentScope::Main, portal.result_table.clone(), ElementState::visible("tabla"));
        session.put(DocumentScope::Main, portal.clear_button.clone(), enabled());
        session.on_click(
            portal.clear_button.clone(),
            ClickEffect {
                remove: vec![(DocumentScope::Main, portal.result_table.clone())],
                ..Default::default()
            },
        );

        portal.finish(&session, &ctx()).await.unwrap();
        assert_eq!(session.clicks.lock().unwrap().as_slice(), &[portal.clear_button.clone()]);
        assert!(session
            .inspect(DocumentScope::Main, &portal.result_table)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn prepare_navigates_back_when_elsewhere() {
        let portal = portal();
        let session = session_at_start(&portal);
        session.set_url("https://sns.ift.org.mx:8081/sns-frontend/error.xhtml");
        portal.prepare(&session, &ctx()).await.unwrap();
        assert_eq!(session.goto_count(), 1);
    }
}
