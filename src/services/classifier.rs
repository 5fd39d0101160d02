//! 结果识别服务 - 业务能力层
//!
//! 提交号码后反复轮询页面，每一轮按固定顺序执行识别规则，
//! 第一条命中的规则立即返回（先命中者胜，而不是最佳匹配）。

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::error::StepResult;
use crate::models::{CheckSpec, Classification, PortalProfile, Probe};
use crate::infrastructure::Session;
use crate::services::element_wait::{Condition, ElementWaiter};

/// 结果识别器
#[derive(Debug, Clone)]
pub struct OutcomeClassifier {
    checks: Vec<CheckSpec>,
}

impl OutcomeClassifier {
    pub fn new(checks: Vec<CheckSpec>) -> Self {
        Self { checks }
    }

    pub fn from_profile(profile: &PortalProfile) -> Self {
        Self::new(profile.checks.clone())
    }

    /// 轮询直到命中或超时
    ///
    /// 超时返回 `TIMEOUT`；单轮内的非会话错误只记录日志，继续下一轮。
    pub async fn classify(
        &self,
        session: &dyn Session,
        timeout: Duration,
        poll: Duration,
    ) -> StepResult<Classification> {
        debug!("轮询结果 (timeout={:?}, poll={:?})", timeout, poll);
        let deadline = Instant::now() + timeout;
        loop {
            match self.evaluate_round(session).await {
                Ok(Some(classification)) => return Ok(classification),
                Ok(None) => {}
                Err(e) if e.is_session() => return Err(e),
                Err(e) => warn!("轮询结果时出错: {}", e),
            }
            let now = Instant::now();
            if now >= deadline {
                warn!("{:?} 内未识别出结果", timeout);
                return Ok(Classification::timed_out());
            }
            sleep(poll.min(deadline - now)).await;
        }
    }

    /// 执行一轮检查
    pub async fn evaluate_round(&self, session: &dyn Session) -> StepResult<Option<Classification>> {
        let instant = ElementWaiter::new(Duration::ZERO, Duration::ZERO);

        for check in &self.checks {
            match &check.probe {
                Probe::Location { url, title } => {
                    if let Some(expected) = url {
                        let current = session.current_url().await?;
                        if current.trim_end_matches('/') == expected.trim_end_matches('/') {
                            debug!("通过 URL 识别为 {}", check.tag);
                            return Ok(Some(Classification::new(&check.tag, None)));
                        }
                    }
                    if let Some(expected) = title {
                        let current = session.title().await?;
                        if current.trim().to_lowercase() == expected.trim().to_lowercase() {
                            debug!("通过标题识别为 {}", check.tag);
                            return Ok(Some(Classification::new(&check.tag, None)));
                        }
                    }
                }
                Probe::UrlContains { fragment } => {
                    let current = session.current_url().await?;
                    if current.contains(fragment.as_str()) {
                        return Ok(Some(Classification::new(&check.tag, None)));
                    }
                }
                Probe::Element { selector, visible } => {
                    let condition = if *visible { Condition::Visible } else { Condition::Present };
                    if let Some(element) = instant.probe(session, selector, &condition).await? {
                        let text = element.text();
                        debug!("识别为 {}: {}", check.tag, crate::utils::truncate_text(text, 100));
                        let detail = (!text.is_empty()).then(|| text.to_string());
                        return Ok(Some(Classification::new(&check.tag, detail)));
                    }
                }
            }
        }
        Ok(None)
    }
}
