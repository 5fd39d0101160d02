//! 浏览器会话能力接口 - 基础设施层
//!
//! 状态机、识别器、等待协议都只依赖这里的 `Session` trait，
//! 不直接接触 chromiumoxide。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt::Display;

use crate::error::StepResult;

/// 元素选择器
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "snake_case")]
pub enum Selector {
    Css(String),
    Id(String),
    #[serde(rename = "xpath")]
    XPath(String),
}

impl Selector {
    pub fn css(value: impl Into<String>) -> Self {
        Selector::Css(value.into())
    }

    pub fn id(value: impl Into<String>) -> Self {
        Selector::Id(value.into())
    }

    pub fn xpath(value: impl Into<String>) -> Self {
        Selector::XPath(value.into())
    }
}

impl Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Selector::Css(v) => write!(f, "css={}", v),
            Selector::Id(v) => write!(f, "id={}", v),
            Selector::XPath(v) => write!(f, "xpath={}", v),
        }
    }
}

/// 文档范围：主文档或第 N 个内嵌 frame
///
/// 范围是值而不是"当前 frame"状态，查找结束后不需要切回主文档。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentScope {
    Main,
    Frame(usize),
}

impl DocumentScope {
    /// 主文档在前，随后按顺序列出每个 frame
    pub fn all(frame_count: usize) -> impl Iterator<Item = DocumentScope> {
        std::iter::once(DocumentScope::Main).chain((0..frame_count).map(DocumentScope::Frame))
    }
}

/// 元素在某一时刻的状态
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementState {
    #[serde(default)]
    pub visible: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub class_name: String,
    #[serde(default)]
    pub aria_disabled: Option<String>,
    #[serde(default)]
    pub text: String,
}

impl ElementState {
    /// 可见且可交互的元素
    pub fn visible(text: impl Into<String>) -> Self {
        Self {
            visible: true,
            aria_disabled: Some("false".to_string()),
            text: text.into(),
            ..Default::default()
        }
    }
}

/// 浏览器会话
///
/// 所有号码共用同一个会话，由批次处理器独占持有，按引用借给状态机。
#[async_trait]
pub trait Session: Send + Sync {
    /// 导航到指定 URL
    async fn goto(&self, url: &str) -> StepResult<()>;

    /// 当前 URL
    async fn current_url(&self) -> StepResult<String>;

    /// 当前页面标题
    async fn title(&self) -> StepResult<String>;

    /// 主文档中内嵌 frame 的数量
    async fn frame_count(&self) -> StepResult<usize>;

    /// 读取元素状态，不存在时返回 None
    async fn inspect(&self, scope: DocumentScope, selector: &Selector) -> StepResult<Option<ElementState>>;

    /// 清空输入框并填入文本
    async fn fill(&self, scope: DocumentScope, selector: &Selector, value: &str) -> StepResult<()>;

    /// 点击元素
    async fn click(&self, scope: DocumentScope, selector: &Selector) -> StepResult<()>;

    /// 执行任意脚本
    async fn evaluate(&self, script: &str) -> StepResult<JsonValue>;

    /// 关闭会话，可重复调用
    async fn close(&self) -> StepResult<()>;
}

/// 会话工厂
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn create(&self) -> anyhow::Result<Box<dyn Session>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scopes_list_main_document_first() {
        let scopes: Vec<_> = DocumentScope::all(2).collect();
        assert_eq!(
            scopes,
            vec![
                DocumentScope::Main,
                DocumentScope::Frame(0),
                DocumentScope::Frame(1)
            ]
        );
    }

    #[test]
    fn selector_deserializes_from_inline_table() {
        #[derive(Deserialize)]
        struct Wrapper {
            sel: Selector,
        }
        let w: Wrapper = toml::from_str(r#"sel = { by = "xpath", value = "//div" }"#).unwrap();
        assert_eq!(w.sel, Selector::xpath("//div"));
        let w: Wrapper = toml::from_str(r#"sel = { by = "id", value = "set-number-telcel-input" }"#).unwrap();
        assert_eq!(w.sel, Selector::id("set-number-telcel-input"));
    }
}
