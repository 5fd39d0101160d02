use serde::{Deserialize, Serialize};

use crate::error::StepError;

/// 兜底失败状态（状态机内部错误）
pub const ERROR_STATUS: &str = "ERROR";
/// 批次边界捕获到的意外错误
pub const GENERAL_ERROR_STATUS: &str = "ERROR_GENERAL";

/// 识别器超时时返回的标签
pub const TIMEOUT_TAG: &str = "TIMEOUT";

/// 结果识别器的输出：命中的标签 + 元素文本
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub tag: String,
    pub detail: Option<String>,
}

impl Classification {
    pub fn new(tag: impl Into<String>, detail: Option<String>) -> Self {
        Self {
            tag: tag.into(),
            detail,
        }
    }

    /// 轮询超时，未命中任何规则
    pub fn timed_out() -> Self {
        Self::new(TIMEOUT_TAG, None)
    }

    pub fn is_timeout(&self) -> bool {
        self.tag == TIMEOUT_TAG
    }
}

/// 单个号码的最终结果
///
/// - `status`: 状态标签（来自门户配置的识别规则，或 `ERROR`）
/// - `value`: 写入结果 CSV 的值
/// - `detail`: 页面上抓取到的原始文本
/// - `failed`: 是否计入失败
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub status: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub failed: bool,
}

impl Outcome {
    /// 正常识别出的结果
    pub fn resolved(status: impl Into<String>, value: impl Into<String>, detail: Option<String>) -> Self {
        Self {
            status: status.into(),
            value: value.into(),
            detail,
            failed: false,
        }
    }

    /// 失败结果，写入值与状态相同
    pub fn failure(status: impl Into<String>, detail: Option<String>) -> Self {
        let status = status.into();
        Self {
            value: status.clone(),
            status,
            detail,
            failed: true,
        }
    }

    /// 重试后仍然失败的步骤错误
    pub fn from_step_error(err: &StepError) -> Self {
        Self::failure(ERROR_STATUS, Some(err.to_string()))
    }

    /// 批次边界兜底
    pub fn general_error(detail: impl Into<String>) -> Self {
        Self::failure(GENERAL_ERROR_STATUS, Some(detail.into()))
    }
}
