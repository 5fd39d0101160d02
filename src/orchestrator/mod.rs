//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `app` - 应用入口
//! - 加载门户配置和输入文件
//! - 选择导航检查或批量处理
//! - 把结果映射为退出状态
//!
//! ### `batch_processor` - 批量号码处理器
//! - 持有唯一的浏览器会话（创建、重建、关闭）
//! - 顺序处理号码，写结果、更新进度、发布快照
//! - 处理 Ctrl-C 中断
//!
//! ## 层次关系
//!
//! ```text
//! app
//!     ↓
//! batch_processor (处理 Vec<Item>)
//!     ↓
//! workflow::ItemFlow (处理单个 Item)
//!     ↓
//! portals + services (门户步骤 / 等待 / 识别 / 写结果)
//!     ↓
//! infrastructure (基础设施：Session)
//! ```

pub mod app;
pub mod batch_processor;

pub use app::App;
pub use batch_processor::{BatchRunner, BatchSummary};
