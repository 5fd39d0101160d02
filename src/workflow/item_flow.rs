//! 号码处理流程 - 流程层
//!
//! 核心职责：定义"一个号码"的完整处理流程
//!
//! 状态顺序：
//! 1. Idle → Submitting（门户 prepare）
//! 2. Submitting → AwaitingResult（门户 submit）
//! 3. AwaitingResult → Terminal（识别结果，门户 finish）
//!
//! 任意一步失败 → Resetting（回到起始页并等待）→ 同一号码重新从 Idle 开始，
//! 只重试一次；重试仍失败则记为 `ERROR`。
//! 结果确定后收尾失败时的清理重置不占用这次重试。

use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::error::{StepError, StepResult};
use crate::infrastructure::Session;
use crate::models::Outcome;
use crate::portals::Portal;
use crate::services::OutcomeClassifier;
use crate::workflow::item_ctx::ItemCtx;

/// 重试策略
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// 最大尝试次数（含第一次）
    pub max_attempts: u32,
    /// 重置后的等待时间
    pub settle: Duration,
    /// 识别结果的总超时
    pub result_timeout: Duration,
    /// 识别结果的轮询间隔
    pub result_poll: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            settle: Duration::from_secs(10),
            result_timeout: Duration::from_secs(20),
            result_poll: Duration::from_millis(500),
        }
    }
}

/// 单个号码的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Idle,
    Submitting,
    AwaitingResult,
    Resetting,
    Terminal,
}

/// 单个号码的处理报告
#[derive(Debug, Clone)]
pub struct ItemReport {
    pub outcome: Outcome,
    pub attempts: u32,
    /// 重试前的重置次数，最多一次
    pub resets: u32,
    /// 收尾失败后为清理页面做过重置，不占用重试次数
    pub cleanup_reset: bool,
    /// 最后一次错误是会话级错误，批次需要重建会话
    pub session_failed: bool,
    pub elapsed: Duration,
    /// 经过的状态（按顺序）
    pub trace: Vec<ItemState>,
}

/// 号码处理流程
///
/// - 编排单个号码的状态转换
/// - 决定何时重置、何时放弃
/// - 不持有会话，只借用
pub struct ItemFlow {
    portal: Box<dyn Portal>,
    classifier: OutcomeClassifier,
    policy: RetryPolicy,
}

impl ItemFlow {
    pub fn new(portal: Box<dyn Portal>, policy: RetryPolicy) -> Self {
        let classifier = OutcomeClassifier::from_profile(portal.profile());
        Self {
            portal,
            classifier,
            policy,
        }
    }

    pub fn portal(&self) -> &dyn Portal {
        self.portal.as_ref()
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// 处理一个号码，总是返回一个最终结果
    pub async fn run(&self, session: &dyn Session, ctx: &ItemCtx) -> ItemReport {
        let started = Instant::now();
        let mut trace = vec![ItemState::Idle];
        let mut attempts = 0;
        let mut resets = 0;

        loop {
            attempts += 1;
            debug!("{} 第 {}/{} 次尝试", ctx, attempts, self.policy.max_attempts);

            match self.attempt(session, ctx, &mut trace).await {
                Ok(outcome) => {
                    let cleanup = self.finish(session, ctx, &mut trace).await;
                    trace.push(ItemState::Terminal);
                    log_outcome(ctx, &outcome);
                    return ItemReport {
                        outcome,
                        attempts,
                        resets,
                        cleanup_reset: cleanup.is_some(),
                        session_failed: cleanup.unwrap_or(false),
                        elapsed: started.elapsed(),
                        trace,
                    };
                }
                Err(e) if attempts < self.policy.max_attempts => {
                    warn!("{} ⚠️ {}，重置页面后重试", ctx, e);
                    resets += 1;
                    self.reset(session, ctx, &mut trace).await;
                    trace.push(ItemState::Idle);
                }
                Err(e) => {
                    error!("{} ❌ 重试后仍然失败 [{}]: {}", ctx, e.tag(), e);
                    trace.push(ItemState::Terminal);
                    return ItemReport {
                        outcome: Outcome::from_step_error(&e),
                        attempts,
                        resets,
                        cleanup_reset: false,
                        session_failed: e.is_session(),
                        elapsed: started.elapsed(),
                        trace,
                    };
                }
            }
        }
    }

    /// 一次完整尝试：prepare → submit → 识别
    async fn attempt(
        &self,
        session: &dyn Session,
        ctx: &ItemCtx,
        trace: &mut Vec<ItemState>,
    ) -> StepResult<Outcome> {
        self.portal.prepare(session, ctx).await?;
        trace.push(ItemState::Submitting);

        self.portal.submit(session, ctx).await?;
        trace.push(ItemState::AwaitingResult);

        let classification = self
            .classifier
            .classify(session, self.policy.result_timeout, self.policy.result_poll)
            .await?;
        debug!("{} 识别结果: {:?}", ctx, classification);
        Ok(self.portal.profile().outcome_for(&classification))
    }

    /// 结果已确定后的收尾，失败只记录日志并重置页面，结果保持不变
    ///
    /// 收尾成功返回 None；否则做一次清理重置，返回会话是否已不可用。
    async fn finish(
        &self,
        session: &dyn Session,
        ctx: &ItemCtx,
        trace: &mut Vec<ItemState>,
    ) -> Option<bool> {
        match self.portal.finish(session, ctx).await {
            Ok(()) => None,
            Err(e) => {
                warn!("{} 收尾失败，重置页面: {}", ctx, e);
                let reset_error = self.reset(session, ctx, trace).await;
                Some(e.is_session() || reset_error.is_some_and(|re| re.is_session()))
            }
        }
    }

    async fn reset(
        &self,
        session: &dyn Session,
        ctx: &ItemCtx,
        trace: &mut Vec<ItemState>,
    ) -> Option<StepError> {
        trace.push(ItemState::Resetting);
        info!("{} 🔄 重置页面: {}", ctx, self.portal.start_url());
        let result = self.portal.reset(session).await.err();
        if let Some(e) = &result {
            warn!("{} 重置失败: {}", ctx, e);
        }
        sleep(self.policy.settle).await;
        result
    }
}

fn log_outcome(ctx: &ItemCtx, outcome: &Outcome) {
    if outcome.failed {
        warn!("{} ⚠️ {} -> {}", ctx, outcome.status, outcome.value);
    } else {
        info!("{} ✅ {} -> {}", ctx, outcome.status, outcome.value);
    }
}
