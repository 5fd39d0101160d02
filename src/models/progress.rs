//! 批次进度
//!
//! 由批次处理器独占修改，每处理完一个号码就生成一次快照交给发布器。

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::RunContext;
use crate::models::{Item, Outcome};

/// 批次状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    Running,
    Completed,
    CompletedWithErrors,
    Interrupted,
}

impl BatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BatchStatus::Running => "RUNNING",
            BatchStatus::Completed => "COMPLETED",
            BatchStatus::CompletedWithErrors => "COMPLETED_WITH_ERRORS",
            BatchStatus::Interrupted => "INTERRUPTED",
        }
    }
}

/// 批次累计状态
#[derive(Debug, Clone)]
pub struct BatchProgress {
    pub total: usize,
    pub processed: usize,
    pub failures: usize,
    pub by_status: BTreeMap<String, usize>,
    pub times: Vec<Duration>,
    pub status: BatchStatus,
    pub last_item: Option<Item>,
    pub last_status: Option<String>,
}

impl BatchProgress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            processed: 0,
            failures: 0,
            by_status: BTreeMap::new(),
            times: Vec::new(),
            status: BatchStatus::Running,
            last_item: None,
            last_status: None,
        }
    }

    /// 记录一个号码的最终结果
    pub fn record(&mut self, item: &Item, outcome: &Outcome, elapsed: Duration) {
        self.processed += 1;
        if outcome.failed {
            self.failures += 1;
        }
        *self.by_status.entry(outcome.status.clone()).or_insert(0) += 1;
        self.times.push(elapsed);
        self.last_item = Some(item.clone());
        self.last_status = Some(outcome.status.clone());
    }

    /// 进度百分比 `round(processed / total * 100)`
    pub fn progress_percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        let pct = (self.processed as f64 / self.total as f64 * 100.0).round();
        pct.clamp(0.0, 100.0) as u8
    }

    /// 单个号码平均耗时（秒）
    pub fn mean_seconds(&self) -> f64 {
        if self.times.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.times.iter().map(Duration::as_secs_f64).sum();
        sum / self.times.len() as f64
    }

    /// 批次结束时设置最终状态
    pub fn finish(&mut self, interrupted: bool) {
        self.status = if interrupted {
            BatchStatus::Interrupted
        } else if self.failures == 0 {
            BatchStatus::Completed
        } else {
            BatchStatus::CompletedWithErrors
        };
    }

    /// 生成发布用的快照
    pub fn snapshot(&self, ctx: &RunContext) -> ProgressSnapshot {
        ProgressSnapshot {
            status: self.status,
            total_numbers: self.total,
            processed_count: self.processed,
            progress: self.progress_percent(),
            last_processed_number: self.last_item.as_ref().map(|i| i.to_string()),
            last_status: self.last_status.clone(),
            email_from: ctx.email_from.clone(),
            email_subject: ctx.email_subject.clone(),
            updated_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S %z").to_string(),
        }
    }
}

/// 进度快照（写入 status.json）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub status: BatchStatus,
    pub total_numbers: usize,
    pub processed_count: usize,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_processed_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_status: Option<String>,
    pub email_from: String,
    pub email_subject: String,
    pub updated_at: String,
}
