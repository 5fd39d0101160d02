//! 门户配置
//!
//! 门户的 URL、选择器、结果识别规则以及状态到输出值的映射都放在 TOML 里，
//! 状态机和识别算法本身不随门户变化。

use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{AppError, AppResult};
use crate::infrastructure::Selector;
use crate::models::{Classification, Outcome};

fn default_reset_settle_secs() -> f64 {
    10.0
}

fn default_unhandled_prefix() -> String {
    "UNHANDLED_".to_string()
}

/// 结果识别规则的探测方式
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Probe {
    /// 当前 URL 等于 `url`（忽略末尾 `/`），或标题等于 `title`（忽略大小写）
    Location {
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        title: Option<String>,
    },
    /// 当前 URL 包含片段
    UrlContains { fragment: String },
    /// 页面（含 frame）中存在该元素，文本作为详情
    Element {
        selector: Selector,
        #[serde(default)]
        visible: bool,
    },
}

/// 一条识别规则
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CheckSpec {
    pub tag: String,
    pub probe: Probe,
}

/// 状态标签到结果的映射
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OutcomeRule {
    pub tag: String,
    /// 写入 CSV 的值，缺省为标签本身
    #[serde(default)]
    pub value: Option<String>,
    /// 优先使用页面文本作为写入值
    #[serde(default)]
    pub use_detail: bool,
    /// 是否计入失败
    #[serde(default)]
    pub failure: bool,
}

/// 门户配置
#[derive(Debug, Clone, Deserialize)]
pub struct PortalProfile {
    pub name: String,
    pub display_name: String,
    pub start_url: String,
    #[serde(default = "default_reset_settle_secs")]
    pub reset_settle_secs: f64,
    #[serde(default)]
    pub selectors: HashMap<String, Selector>,
    #[serde(default)]
    pub settings: HashMap<String, String>,
    pub checks: Vec<CheckSpec>,
    #[serde(default)]
    pub outcomes: Vec<OutcomeRule>,
    #[serde(default = "default_unhandled_prefix")]
    pub unhandled_prefix: String,
}

impl PortalProfile {
    /// 从 TOML 文本解析并校验
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let profile: PortalProfile = toml::from_str(content)?;
        profile.validate()?;
        Ok(profile)
    }

    fn validate(&self) -> AppResult<()> {
        if self.checks.is_empty() {
            return Err(AppError::Config(format!("门户 {} 没有配置识别规则", self.name)));
        }
        if Duration::try_from_secs_f64(self.reset_settle_secs).is_err() {
            return Err(AppError::Config(format!(
                "门户 {} 的 reset_settle_secs 无效: {}",
                self.name, self.reset_settle_secs
            )));
        }
        Ok(())
    }

    /// 按名称取选择器
    pub fn selector(&self, name: &str) -> AppResult<Selector> {
        self.selectors
            .get(name)
            .cloned()
            .ok_or_else(|| AppError::Config(format!("门户 {} 缺少选择器 `{}`", self.name, name)))
    }

    /// 按名称取设置项
    pub fn setting(&self, name: &str) -> Option<&str> {
        self.settings.get(name).map(String::as_str)
    }

    /// 按名称取以秒为单位的设置项，缺失或无法解析时使用默认值
    pub fn setting_secs(&self, name: &str, default: f64) -> Duration {
        let fallback = Duration::try_from_secs_f64(default).unwrap_or_default();
        let Some(raw) = self.setting(name) else {
            return fallback;
        };
        match raw.trim().parse::<f64>().map(Duration::try_from_secs_f64) {
            Ok(Ok(value)) => value,
            _ => {
                tracing::warn!("门户 {} 的设置 {} 无效: {}，使用默认值 {}", self.name, name, raw, default);
                fallback
            }
        }
    }

    /// 重置后的等待时间
    pub fn reset_settle(&self) -> Duration {
        Duration::try_from_secs_f64(self.reset_settle_secs)
            .unwrap_or_else(|_| Duration::from_secs_f64(default_reset_settle_secs()))
    }

    /// 将识别结果映射为最终结果
    ///
    /// 未配置映射的标签写为 `UNHANDLED_<标签>` 并计入失败。
    pub fn outcome_for(&self, classification: &Classification) -> Outcome {
        let detail = classification.detail.clone();
        match self.outcomes.iter().find(|r| r.tag == classification.tag) {
            Some(rule) => {
                let fallback = rule.value.clone().unwrap_or_else(|| rule.tag.clone());
                let value = if rule.use_detail {
                    detail.clone().unwrap_or(fallback)
                } else {
                    fallback
                };
                Outcome {
                    status: rule.tag.clone(),
                    value,
                    detail,
                    failed: rule.failure,
                }
            }
            None => Outcome {
                status: classification.tag.clone(),
                value: format!("{}{}", self.unhandled_prefix, classification.tag),
                detail,
                failed: true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
name = "demo"
display_name = "Demo"
start_url = "https://portal.example/"
reset_settle_secs = 0.5

[selectors]
input = { by = "id", value = "number" }

[settings]
payment_path = "/ps/home/"

[[checks]]
tag = "HOME"
probe = { kind = "location", url = "https://portal.example/", title = "recargas telcel" }

[[checks]]
tag = "SUCCESS"
probe = { kind = "element", selector = { by = "css", value = "p.ok" } }

[[outcomes]]
tag = "SUCCESS"
use_detail = true

[[outcomes]]
tag = "TIMEOUT"
value = "N/A"
failure = true
"#;

    #[test]
    fn parses_profile_with_ordered_checks() {
        let profile = PortalProfile::from_toml_str(SAMPLE).unwrap();
        assert_eq!(profile.checks.len(), 2);
        assert_eq!(profile.checks[0].tag, "HOME");
        assert!(matches!(profile.checks[1].probe, Probe::Element { visible: false, .. }));
        assert_eq!(profile.selector("input").unwrap(), Selector::id("number"));
        assert!(profile.selector("missing").is_err());
        assert_eq!(profile.setting("payment_path"), Some("/ps/home/"));
        assert_eq!(profile.setting_secs("missing", 1.5), Duration::from_millis(1500));
        assert_eq!(profile.setting_secs("payment_path", 2.0), Duration::from_secs(2));
        assert_eq!(profile.reset_settle(), Duration::from_millis(500));
    }

    #[test]
    fn outcome_mapping_follows_rules() {
        let profile = PortalProfile::from_toml_str(SAMPLE).unwrap();

        let with_detail = profile.outcome_for(&Classification::new("SUCCESS", Some("$200.00".into())));
        assert_eq!(with_detail.value, "$200.00");
        assert!(!with_detail.failed);

        let without_detail = profile.outcome_for(&Classification::new("SUCCESS", None));
        assert_eq!(without_detail.value, "SUCCESS");

        let timeout = profile.outcome_for(&Classification::timed_out());
        assert_eq!(timeout.value, "N/A");
        assert!(timeout.failed);

        let unknown = profile.outcome_for(&Classification::new("HOME", None));
        assert_eq!(unknown.value, "UNHANDLED_HOME");
        assert!(unknown.failed);
    }

    #[test]
    fn profile_without_checks_is_rejected() {
        let err = PortalProfile::from_toml_str(
            r#"
name = "x"
display_name = "X"
start_url = "https://x/"
checks = []
"#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn oversized_durations_are_rejected_not_panicking() {
        let huge = SAMPLE.replace("reset_settle_secs = 0.5", "reset_settle_secs = 1e30");
        assert!(PortalProfile::from_toml_str(&huge).is_err());

        let mut profile = PortalProfile::from_toml_str(SAMPLE).unwrap();
        profile.settings.insert("enable_wait_secs".into(), "1e30".into());
        assert_eq!(profile.setting_secs("enable_wait_secs", 15.0), Duration::from_secs(15));
    }
}
