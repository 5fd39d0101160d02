use std::time::Duration;

use thiserror::Error;

/// 单步操作错误
///
/// 状态机里任何一步（定位、输入、提交、等待结果）都只会产生这几类错误，
/// 每一类都会触发一次"重置后重试"。
#[derive(Debug, Clone, Error)]
pub enum StepError {
    /// 操作控件在超时内一直不可用
    #[error("控件未就绪: {what}")]
    ElementNotReady { what: String },

    /// 等待超时
    #[error("等待 {what} 超时 ({timeout:?})")]
    Timeout { what: String, timeout: Duration },

    /// 之前定位到的元素已经失效
    #[error("元素已失效: {what}")]
    StaleReference { what: String },

    /// 浏览器会话本身不可用
    #[error("浏览器会话不可用: {0}")]
    Session(String),

    /// 其他错误
    #[error("{0}")]
    Generic(String),
}

impl StepError {
    /// 创建超时错误
    pub fn timeout(what: impl Into<String>, timeout: Duration) -> Self {
        StepError::Timeout {
            what: what.into(),
            timeout,
        }
    }

    /// 错误分类标签（用于日志和统计）
    pub fn tag(&self) -> &'static str {
        match self {
            StepError::ElementNotReady { .. } => "ELEMENT_NOT_READY",
            StepError::Timeout { .. } => "TIMEOUT",
            StepError::StaleReference { .. } => "STALE_REFERENCE",
            StepError::Session(_) => "SESSION_ERROR",
            StepError::Generic(_) => "ERROR",
        }
    }

    /// 是否是会话级错误（需要重建浏览器）
    pub fn is_session(&self) -> bool {
        matches!(self, StepError::Session(_))
    }
}

/// 只有连接层面的错误才算会话失效
///
/// 页面导航中 Chrome 返回的协议错误（如 "Execution context was destroyed."）
/// 只说明当前页面上的引用失效，轮询可以继续。
impl From<chromiumoxide::error::CdpError> for StepError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        use chromiumoxide::error::CdpError;
        match err {
            CdpError::Timeout => StepError::timeout("浏览器响应", Duration::ZERO),
            CdpError::JavascriptException(e) => StepError::Generic(format!("脚本异常: {:?}", e)),
            CdpError::Ws(_)
            | CdpError::Io(_)
            | CdpError::NoResponse
            | CdpError::UnexpectedWsMessage(_)
            | CdpError::ChannelSendError(_)
            | CdpError::LaunchExit(..)
            | CdpError::LaunchTimeout(_)
            | CdpError::LaunchIo(..) => StepError::Session(err.to_string()),
            CdpError::Chrome(_)
            | CdpError::ChromeMessage(_)
            | CdpError::NotFound
            | CdpError::FrameNotFound(_) => StepError::StaleReference {
                what: err.to_string(),
            },
            other => StepError::Generic(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for StepError {
    fn from(err: serde_json::Error) -> Self {
        StepError::Generic(format!("JSON解析失败: {}", err))
    }
}

/// 批次级错误
///
/// 这些错误会终止整个批次，并映射到不同的进程退出码。
#[derive(Debug, Error)]
pub enum AppError {
    /// 创建浏览器会话失败
    #[error("无法创建浏览器会话: {0}")]
    SessionCreation(String),

    /// 关闭浏览器会话失败
    #[error("关闭浏览器会话失败: {0}")]
    SessionTeardown(String),

    /// 门户首页导航失败
    #[error("导航准备失败: {0}")]
    NavigationSetup(String),

    /// 输入文件不存在
    #[error("输入文件不存在: {path}")]
    InputMissing { path: String },

    /// 输入文件无法读取
    #[error("无法读取输入文件 ({path}): {reason}")]
    InputUnreadable { path: String, reason: String },

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),
}

impl AppError {
    /// 对应的进程退出状态
    pub fn exit_status(&self) -> RunExit {
        match self {
            AppError::SessionCreation(_) | AppError::SessionTeardown(_) | AppError::Config(_) => {
                RunExit::Unexpected
            }
            AppError::NavigationSetup(_) => RunExit::NavigationSetup,
            AppError::InputMissing { .. } => RunExit::InputMissing,
            AppError::InputUnreadable { .. } => RunExit::InputUnreadable,
        }
    }
}

/// 进程退出状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    /// 全部成功
    Success,
    /// 未预期的失败（会话创建/关闭等）
    Unexpected,
    /// 门户导航失败
    NavigationSetup,
    /// 输入文件不存在
    InputMissing,
    /// 输入文件无法读取
    InputUnreadable,
    /// 批次完成，但有号码失败
    CompletedWithErrors,
    /// 被操作员中断
    Interrupted,
}

impl RunExit {
    pub fn code(self) -> u8 {
        match self {
            RunExit::Success => 0,
            RunExit::Unexpected => 1,
            RunExit::NavigationSetup => 3,
            RunExit::InputMissing => 4,
            RunExit::InputUnreadable => 5,
            RunExit::CompletedWithErrors => 6,
            RunExit::Interrupted => 130,
        }
    }
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

/// 单步操作结果类型
pub type StepResult<T> = Result<T, StepError>;
