//! 批量号码处理器 - 编排层
//!
//! ## 职责
//!
//! 1. **会话管理**：创建唯一的浏览器会话，结束时（包括中断）一定关闭
//! 2. **顺序处理**：按输入顺序逐个交给 `ItemFlow`
//! 3. **结果落盘**：每个号码结束后立即写入结果 CSV 并更新进度
//! 4. **进度发布**：每个号码之后发布一次快照（有超时，失败只记日志）
//! 5. **兜底**：流程中的 panic 记为 `ERROR_GENERAL`，会话失效时重建
//!
//! ## 设计特点
//!
//! - **资源所有者**：唯一持有会话的模块，按引用借给流程层
//! - **不做业务判断**：结果由流程层给出，这里只负责记录和统计

use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::RunContext;
use crate::error::{AppError, AppResult, RunExit};
use crate::infrastructure::{Session, SessionFactory};
use crate::models::{BatchProgress, BatchStatus, Item, Outcome};
use crate::services::{CsvResultLog, StatusPublisher};
use crate::utils::logging::print_final_stats;
use crate::workflow::{ItemCtx, ItemFlow};

/// 批次结果
#[derive(Debug, Clone)]
pub struct BatchSummary {
    pub progress: BatchProgress,
    pub results: Vec<(Item, Outcome)>,
}

impl BatchSummary {
    pub fn status(&self) -> BatchStatus {
        self.progress.status
    }

    /// 对应的进程退出状态
    pub fn exit(&self) -> RunExit {
        match self.progress.status {
            BatchStatus::Completed => RunExit::Success,
            BatchStatus::CompletedWithErrors => RunExit::CompletedWithErrors,
            BatchStatus::Interrupted => RunExit::Interrupted,
            BatchStatus::Running => RunExit::Unexpected,
        }
    }
}

/// 批量处理器
pub struct BatchRunner {
    flow: ItemFlow,
    results: CsvResultLog,
    publisher: Option<Box<dyn StatusPublisher>>,
    run_ctx: RunContext,
    publish_timeout: Duration,
    log_file: Option<std::path::PathBuf>,
}

impl BatchRunner {
    pub fn new(flow: ItemFlow, results: CsvResultLog, run_ctx: RunContext) -> Self {
        Self {
            flow,
            results,
            publisher: None,
            run_ctx,
            publish_timeout: Duration::from_secs(30),
            log_file: None,
        }
    }

    pub fn with_publisher(mut self, publisher: Box<dyn StatusPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn with_publish_timeout(mut self, publish_timeout: Duration) -> Self {
        self.publish_timeout = publish_timeout;
        self
    }

    pub fn with_log_file(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    pub fn results(&self) -> &CsvResultLog {
        &self.results
    }

    /// 处理全部号码，Ctrl-C 时中断
    pub async fn run(&mut self, items: Vec<Item>, factory: &dyn SessionFactory) -> AppResult<BatchSummary> {
        self.run_until(items, factory, ctrl_c_interrupt()).await
    }

    /// 处理全部号码，`interrupt` 完成时中断
    pub async fn run_until<F>(
        &mut self,
        items: Vec<Item>,
        factory: &dyn SessionFactory,
        interrupt: F,
    ) -> AppResult<BatchSummary>
    where
        F: Future<Output = ()>,
    {
        let mut session = factory
            .create()
            .await
            .map_err(|e| AppError::SessionCreation(format!("{:#}", e)))?;

        let mut progress = BatchProgress::new(items.len());
        info!("📦 开始处理 {} 个号码", items.len());
        self.publish(&progress).await;

        let (interrupted, fatal) = tokio::select! {
            result = self.process_items(&items, &mut session, &mut progress, factory) => (false, result.err()),
            _ = interrupt => (true, None),
        };

        if interrupted {
            warn!("⛔ 收到中断信号，停止处理 (已处理 {}/{})", progress.processed, progress.total);
        }
        progress.finish(interrupted);
        self.publish(&progress).await;
        self.results.seal();

        let teardown = session.close().await;
        match &teardown {
            Ok(()) => debug!("浏览器会话已关闭"),
            Err(e) => error!("关闭浏览器会话失败: {}", e),
        }

        print_final_stats(&progress, self.results.path(), self.log_file.as_deref());

        if let Some(e) = fatal {
            return Err(e);
        }
        teardown.map_err(|e| AppError::SessionTeardown(e.to_string()))?;

        Ok(BatchSummary {
            results: self.results.export(),
            progress,
        })
    }

    async fn process_items(
        &mut self,
        items: &[Item],
        session: &mut Box<dyn Session>,
        progress: &mut BatchProgress,
        factory: &dyn SessionFactory,
    ) -> AppResult<()> {
        let total = items.len();

        for (index, item) in items.iter().enumerate() {
            let ctx = ItemCtx::new(item.clone(), index + 1, total);
            info!("{} 开始处理", ctx);
            let started = Instant::now();

            let run = AssertUnwindSafe(self.flow.run(session.as_ref(), &ctx))
                .catch_unwind()
                .await;
            let (outcome, session_failed) = match run {
                Ok(report) => (report.outcome, report.session_failed),
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    error!("{} ❌ 处理时发生意外错误: {}", ctx, message);
                    (Outcome::general_error(message), false)
                }
            };

            self.record(item, &outcome, started.elapsed(), progress);
            self.publish(progress).await;

            if session_failed && index + 1 < total {
                if let Err(e) = self.recreate_session(session, factory).await {
                    error!("❌ 无法重建浏览器会话，剩余号码记为失败: {}", e);
                    let reason = e.to_string();
                    for rest in &items[index + 1..] {
                        self.record(rest, &Outcome::general_error(reason.clone()), Duration::ZERO, progress);
                    }
                    self.publish(progress).await;
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    fn record(&mut self, item: &Item, outcome: &Outcome, elapsed: Duration, progress: &mut BatchProgress) {
        if let Err(e) = self.results.append(item, outcome) {
            error!("写入结果失败: {:#}", e);
        }
        progress.record(item, outcome, elapsed);
        debug!(
            "进度 {}/{} ({}%)",
            progress.processed,
            progress.total,
            progress.progress_percent()
        );
    }

    async fn recreate_session(
        &self,
        session: &mut Box<dyn Session>,
        factory: &dyn SessionFactory,
    ) -> AppResult<()> {
        warn!("🔁 浏览器会话失效，正在重建...");
        if let Err(e) = session.close().await {
            debug!("关闭失效会话时出错: {}", e);
        }
        let fresh = factory
            .create()
            .await
            .map_err(|e| AppError::SessionCreation(format!("{:#}", e)))?;
        *session = fresh;
        info!("✓ 浏览器会话已重建");
        Ok(())
    }

    async fn publish(&self, progress: &BatchProgress) {
        let Some(publisher) = &self.publisher else {
            return;
        };
        let snapshot = progress.snapshot(&self.run_ctx);
        match timeout(
            self.publish_timeout,
            publisher.publish(&snapshot, self.results.path()),
        )
        .await
        {
            Ok(Ok(())) => debug!("进度已发布: {}%", snapshot.progress),
            Ok(Err(e)) => warn!("发布进度失败: {:#}", e),
            Err(_) => warn!("发布进度超时 ({:?})", self.publish_timeout),
        }
    }
}

/// 操作员按下 Ctrl-C 时完成；无法监听信号时永不完成
pub(crate) async fn ctrl_c_interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("无法监听中断信号: {}", e);
        std::future::pending::<()>().await;
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "未知错误".to_string()
    }
}
