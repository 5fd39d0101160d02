//! 业务能力层（Services）
//!
//! 每个服务只描述"我能做什么"，只处理单个号码或单次发布，不关心批次流程。

pub mod classifier;
pub mod element_wait;
pub mod result_log;
pub mod status_publisher;

pub use classifier::OutcomeClassifier;
pub use element_wait::{Condition, Element, ElementWaiter};
pub use result_log::CsvResultLog;
pub use status_publisher::{
    render_status_page, LocalStatusPublisher, S3StatusPublisher, StatusPublisher,
};
