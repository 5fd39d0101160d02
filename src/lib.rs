//! # Phone Status Scraper
//!
//! 通过浏览器自动化，把一批手机号码逐个提交到 Telcel 支付门户或 IFT 号码查询门户，
//! 识别每个号码的状态并写入结果 CSV，同时发布处理进度。
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有浏览器，只暴露 `Session` 能力
//! - `JsExecutor` - 唯一的 page owner，提供 eval() 能力
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个号码
//! - `ElementWaiter` - 元素等待（含内嵌 frame）
//! - `OutcomeClassifier` - 按优先级识别结果
//! - `CsvResultLog` - 写结果 CSV
//! - `StatusPublisher` - 发布进度（本地 / S3）
//!
//! ### ③ 门户层（Portals）
//! - `portals/` - 每个门户页面上的具体步骤
//!
//! ### ④ 流程层（Workflow）
//! - `workflow/` - 定义"一个号码"的状态机（含一次重置重试）
//!
//! ### ⑤ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 批量处理，管理会话和进度
//! - `orchestrator/app` - 应用入口，映射退出状态

pub mod browser;
pub mod cli;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod logger;
pub mod models;
pub mod orchestrator;
pub mod portals;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::{Config, RunContext};
pub use error::{AppError, AppResult, RunExit, StepError, StepResult};
pub use infrastructure::{DocumentScope, ElementState, JsExecutor, Selector, Session, SessionFactory};
pub use models::{BatchProgress, BatchStatus, Item, Outcome, PortalProfile};
pub use orchestrator::{App, BatchRunner, BatchSummary};
pub use portals::{create_portal, IftPortal, Portal, TelcelPortal};
pub use workflow::{ItemCtx, ItemFlow, RetryPolicy};
