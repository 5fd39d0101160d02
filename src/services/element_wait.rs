//! 元素等待 - 业务能力层
//!
//! 以固定间隔轮询会话，直到元素满足条件或超时。
//! 主文档找不到时按顺序搜索每个内嵌 frame。

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::error::{StepError, StepResult};
use crate::infrastructure::{DocumentScope, ElementState, Selector, Session};

/// 元素需要满足的条件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// 存在于 DOM 中
    Present,
    /// 可见
    Visible,
    /// 可见且没有 disabled 属性
    Clickable,
    /// class 中没有禁用标记，并且 aria-disabled 为 "false"（两者同时成立）
    Enabled { disabled_class: String },
}

impl Condition {
    pub fn holds(&self, state: &ElementState) -> bool {
        match self {
            Condition::Present => true,
            Condition::Visible => state.visible,
            Condition::Clickable => state.visible && !state.disabled,
            Condition::Enabled { disabled_class } => {
                let marked = state
                    .class_name
                    .split_whitespace()
                    .any(|class| class == disabled_class);
                !marked && state.aria_disabled.as_deref() == Some("false")
            }
        }
    }
}

/// 找到的元素
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub scope: DocumentScope,
    pub selector: Selector,
    pub state: ElementState,
}

impl Element {
    /// 去掉首尾空白的文本
    pub fn text(&self) -> &str {
        self.state.text.trim()
    }
}

/// 元素等待器
#[derive(Debug, Clone, Copy)]
pub struct ElementWaiter {
    timeout: Duration,
    poll: Duration,
}

impl ElementWaiter {
    pub fn new(timeout: Duration, poll: Duration) -> Self {
        Self { timeout, poll }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 复制一份使用不同超时的等待器
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            timeout,
            poll: self.poll,
        }
    }

    /// 单次检查：主文档，然后每个 frame
    ///
    /// 只有会话级错误会向上传播，其余错误视为本轮未找到。
    pub async fn probe(
        &self,
        session: &dyn Session,
        selector: &Selector,
        condition: &Condition,
    ) -> StepResult<Option<Element>> {
        let frames = match session.frame_count().await {
            Ok(count) => count,
            Err(e) if e.is_session() => return Err(e),
            Err(e) => {
                debug!("读取 frame 数量失败，只搜索主文档: {}", e);
                0
            }
        };

        for scope in DocumentScope::all(frames) {
            match session.inspect(scope, selector).await {
                Ok(Some(state)) if condition.holds(&state) => {
                    return Ok(Some(Element {
                        scope,
                        selector: selector.clone(),
                        state,
                    }));
                }
                Ok(_) => {}
                Err(e) if e.is_session() => return Err(e),
                Err(e) => debug!("检查 {} ({:?}) 失败: {}", selector, scope, e),
            }
        }
        Ok(None)
    }

    /// 等待元素满足条件，超时返回 None（不报错）
    pub async fn find(
        &self,
        session: &dyn Session,
        selector: &Selector,
        condition: &Condition,
    ) -> StepResult<Option<Element>> {
        let deadline = Instant::now() + self.timeout;
        loop {
            if let Some(element) = self.probe(session, selector, condition).await? {
                return Ok(Some(element));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            sleep(self.poll.min(deadline - now)).await;
        }
    }

    /// 等待元素满足条件，超时返回 `StepError::Timeout`
    pub async fn require(
        &self,
        session: &dyn Session,
        selector: &Selector,
        condition: &Condition,
        what: &str,
    ) -> StepResult<Element> {
        self.find(session, selector, condition)
            .await?
            .ok_or_else(|| StepError::timeout(what, self.timeout))
    }

    /// 等待操作按钮变为可用，超时返回 `StepError::ElementNotReady`
    pub async fn require_enabled(
        &self,
        session: &dyn Session,
        selector: &Selector,
        disabled_class: &str,
        what: &str,
    ) -> StepResult<Element> {
        let condition = Condition::Enabled {
            disabled_class: disabled_class.to_string(),
        };
        self.find(session, selector, &condition)
            .await?
            .ok_or_else(|| StepError::ElementNotReady {
                what: format!("{} 在 {:?} 内未启用", what, self.timeout),
            })
    }

    /// 等待元素消失或隐藏，超时返回 false
    pub async fn wait_until_gone(&self, session: &dyn Session, selector: &Selector) -> StepResult<bool> {
        let deadline = Instant::now() + self.timeout;
        loop {
            match session.inspect(DocumentScope::Main, selector).await {
                Ok(None) => return Ok(true),
                Ok(Some(state)) if !state.visible => return Ok(true),
                Ok(Some(_)) => {}
                Err(e) if e.is_session() => return Err(e),
                Err(_) => return Ok(true),
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            sleep(self.poll.min(deadline - now)).await;
        }
    }

    /// 等待当前 URL 满足条件，返回该 URL
    pub async fn wait_for_url<F>(&self, session: &dyn Session, predicate: F, what: &str) -> StepResult<String>
    where
        F: Fn(&str) -> bool + Send + Sync,
    {
        let deadline = Instant::now() + self.timeout;
        loop {
            let url = session.current_url().await?;
            if predicate(&url) {
                return Ok(url);
            }
            let now = Instant::now();
            if now >= deadline {
                debug!("等待 URL 超时，当前 URL: {}", url);
                return Err(StepError::timeout(what, self.timeout));
            }
            sleep(self.poll.min(deadline - now)).await;
        }
    }
}
