//! 基于 chromiumoxide 的会话实现
//!
//! 元素的查找、读取、输入、点击全部通过 `JsExecutor` 执行脚本完成，
//! frame 内的元素通过 `contentDocument` 访问（仅限同源 frame）。

use async_trait::async_trait;
use chromiumoxide::Browser;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::browser::{self, LaunchOptions};
use crate::error::{StepError, StepResult};
use crate::infrastructure::session::{DocumentScope, ElementState, Selector, Session, SessionFactory};
use crate::infrastructure::JsExecutor;

const INSPECT_BODY: &str = r#"
            const view = el.ownerDocument.defaultView || window;
            const style = view.getComputedStyle(el);
            const boxed = !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length);
            return {
                found: true,
                state: {
                    visible: boxed && style.visibility !== 'hidden' && style.display !== 'none',
                    disabled: !!el.disabled,
                    className: el.getAttribute('class') || '',
                    ariaDisabled: el.getAttribute('aria-disabled'),
                    text: el.innerText || el.textContent || ''
                }
            };"#;

const CLICK_BODY: &str = r#"
            el.scrollIntoView(true);
            el.click();
            return { found: true };"#;

/// 脚本执行结果
#[derive(Debug, Deserialize)]
struct ScriptProbe {
    found: bool,
    #[serde(default)]
    state: Option<ElementState>,
}

/// 构造"在指定范围内找到元素后执行 body"的脚本
///
/// body 中可以使用变量 `el`，必须返回 `{ found: true, ... }`。
fn element_script(scope: DocumentScope, selector: &Selector, body: &str) -> StepResult<String> {
    let selector_json = serde_json::to_string(selector)?;
    let frame = match scope {
        DocumentScope::Main => "null".to_string(),
        DocumentScope::Frame(index) => index.to_string(),
    };
    Ok(format!(
        r#"
        (() => {{
            const frameIndex = {frame};
            const sel = {selector_json};
            let root = document;
            if (frameIndex !== null) {{
                const frame = document.querySelectorAll('iframe, frame')[frameIndex];
                if (!frame) return {{ found: false }};
                try {{ root = frame.contentDocument; }} catch (e) {{ return {{ found: false }}; }}
                if (!root) return {{ found: false }};
            }}
            let el = null;
            if (sel.by === 'css') {{
                el = root.querySelector(sel.value);
            }} else if (sel.by === 'id') {{
                el = root.getElementById(sel.value);
            }} else {{
                el = root.evaluate(sel.value, root, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue;
            }}
            if (!el) return {{ found: false }};
            {body}
        }})()
        "#
    ))
}

/// 逐字符输入，每个字符都触发 keydown / input / keyup
///
/// 有些表单（如 IFT 的查询按钮）只在 keyup 时才启用提交。
fn fill_body(value: &str) -> StepResult<String> {
    let value_json = serde_json::to_string(value)?;
    Ok(format!(
        r#"
            el.focus();
            const desc = Object.getOwnPropertyDescriptor(Object.getPrototypeOf(el), 'value');
            const setValue = (v) => (desc && desc.set) ? desc.set.call(el, v) : (el.value = v);
            const key = (type, ch) => el.dispatchEvent(new KeyboardEvent(type, {{ key: ch, bubbles: true }}));
            setValue('');
            let typed = '';
            for (const ch of {value_json}) {{
                key('keydown', ch);
                key('keypress', ch);
                typed += ch;
                setValue(typed);
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                key('keyup', ch);
            }}
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            return {{ found: true }};"#
    ))
}

/// 关闭浏览器、等待进程退出各自的上限
const CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

/// 给可能挂起的浏览器操作加上时限
async fn within<T>(
    what: &str,
    limit: Duration,
    fut: impl Future<Output = StepResult<T>>,
) -> StepResult<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(StepError::timeout(what, limit)),
    }
}

async fn kill_process(browser: &mut Browser) {
    match browser.kill().await {
        Some(Err(e)) => warn!("结束浏览器进程失败: {}", e),
        Some(Ok(())) => info!("浏览器进程已强制结束"),
        None => {}
    }
}

/// 关闭自己启动的浏览器；正常关闭失败或进程迟迟不退出时强制结束
async fn shutdown(browser: &mut Browser) -> StepResult<()> {
    let closed = within("关闭浏览器", CLOSE_TIMEOUT, async {
        browser.close().await.map(|_| ()).map_err(StepError::from)
    })
    .await;
    if let Err(e) = &closed {
        warn!("正常关闭浏览器失败，强制结束进程: {}", e);
        kill_process(browser).await;
    }

    let exited = within("浏览器进程退出", CLOSE_TIMEOUT, async {
        browser
            .wait()
            .await
            .map(|_| ())
            .map_err(|e| StepError::Generic(e.to_string()))
    })
    .await;
    if let Err(e) = exited {
        warn!("{}，强制结束进程", e);
        kill_process(browser).await;
    }
    closed
}

/// Chrome 会话
pub struct ChromeSession {
    executor: JsExecutor,
    browser: tokio::sync::Mutex<Option<Browser>>,
    handler: Mutex<Option<JoinHandle<()>>>,
    /// 连接的是已有浏览器，关闭时只关自己的页面
    attached: bool,
}

impl ChromeSession {
    pub fn new(browser: Browser, executor: JsExecutor, handler: JoinHandle<()>, attached: bool) -> Self {
        Self {
            executor,
            browser: tokio::sync::Mutex::new(Some(browser)),
            handler: Mutex::new(Some(handler)),
            attached,
        }
    }

    async fn run_on_element(
        &self,
        scope: DocumentScope,
        selector: &Selector,
        body: &str,
    ) -> StepResult<ScriptProbe> {
        let script = element_script(scope, selector, body)?;
        self.executor.eval_as::<ScriptProbe>(script).await
    }
}

#[async_trait]
impl Session for ChromeSession {
    async fn goto(&self, url: &str) -> StepResult<()> {
        debug!("导航到: {}", url);
        self.executor.page().goto(url).await?;
        Ok(())
    }

    async fn current_url(&self) -> StepResult<String> {
        Ok(self.executor.page().url().await?.unwrap_or_default())
    }

    async fn title(&self) -> StepResult<String> {
        Ok(self.executor.page().get_title().await?.unwrap_or_default())
    }

    async fn frame_count(&self) -> StepResult<usize> {
        self.executor
            .eval_as::<usize>("document.querySelectorAll('iframe, frame').length")
            .await
    }

    async fn inspect(&self, scope: DocumentScope, selector: &Selector) -> StepResult<Option<ElementState>> {
        let probe = self.run_on_element(scope, selector, INSPECT_BODY).await?;
        Ok(if probe.found { probe.state } else { None })
    }

    async fn fill(&self, scope: DocumentScope, selector: &Selector, value: &str) -> StepResult<()> {
        let body = fill_body(value)?;
        let probe = self.run_on_element(scope, selector, &body).await?;
        if !probe.found {
            return Err(StepError::StaleReference {
                what: selector.to_string(),
            });
        }
        Ok(())
    }

    async fn click(&self, scope: DocumentScope, selector: &Selector) -> StepResult<()> {
        let probe = self.run_on_element(scope, selector, CLICK_BODY).await?;
        if !probe.found {
            return Err(StepError::StaleReference {
                what: selector.to_string(),
            });
        }
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> StepResult<JsonValue> {
        self.executor.eval(script).await
    }

    async fn close(&self) -> StepResult<()> {
        let mut guard = self.browser.lock().await;
        let Some(mut browser) = guard.take() else {
            return Ok(());
        };
        let result = if self.attached {
            let page = self.executor.page().clone();
            within("关闭页面", CLOSE_TIMEOUT, async {
                page.close().await.map_err(StepError::from)
            })
            .await
        } else {
            shutdown(&mut browser).await
        };
        drop(browser);
        if let Ok(mut handler) = self.handler.lock() {
            if let Some(handle) = handler.take() {
                handle.abort();
            }
        }
        result?;
        info!("{}", if self.attached { "页面已关闭" } else { "浏览器已关闭" });
        Ok(())
    }
}

/// 浏览器会话的创建方式
#[derive(Debug, Clone)]
pub enum ChromeMode {
    /// 启动新的浏览器进程
    Launch(LaunchOptions),
    /// 连接到已有浏览器的调试端口
    Attach { port: u16 },
}

/// Chrome 会话工厂
pub struct ChromeSessionFactory {
    mode: ChromeMode,
}

impl ChromeSessionFactory {
    pub fn new(mode: ChromeMode) -> Self {
        Self { mode }
    }
}

#[async_trait]
impl SessionFactory for ChromeSessionFactory {
    async fn create(&self) -> anyhow::Result<Box<dyn Session>> {
        let (browser, page, handle) = match &self.mode {
            ChromeMode::Launch(options) => browser::launch_browser(options).await?,
            ChromeMode::Attach { port } => browser::connect_to_browser(*port).await?,
        };
        let attached = matches!(self.mode, ChromeMode::Attach { .. });
        Ok(Box::new(ChromeSession::new(browser, JsExecutor::new(page), handle, attached)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_script_embeds_scope_and_selector() {
        let script = element_script(DocumentScope::Frame(2), &Selector::id("FORM_myform:BTN_publicSearch"), CLICK_BODY).unwrap();
        assert!(script.contains("const frameIndex = 2;"));
        assert!(script.contains(r#"{"by":"id","value":"FORM_myform:BTN_publicSearch"}"#));
        assert!(script.contains("el.click();"));

        let main = element_script(DocumentScope::Main, &Selector::css("p.success__text"), INSPECT_BODY).unwrap();
        assert!(main.contains("const frameIndex = null;"));
    }

    #[tokio::test]
    async fn hung_browser_call_is_bounded() {
        let started = std::time::Instant::now();
        let err = within("关闭浏览器", Duration::from_millis(30), std::future::pending::<StepResult<()>>())
            .await
            .unwrap_err();
        assert!(matches!(err, StepError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(2));

        let ok = within("关闭浏览器", Duration::from_millis(30), async { Ok(7) }).await;
        assert_eq!(ok.unwrap(), 7);
    }

    #[test]
    fn fill_body_escapes_value() {
        let body = fill_body("55\"12").unwrap();
        assert!(body.contains(r#""55\"12""#));
        assert!(body.contains("key('keyup', ch);"));
        assert!(body.contains("key('keydown', ch);"));
    }
}
