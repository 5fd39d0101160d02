//! 测试用的脚本化会话
//!
//! 用内存中的元素表模拟页面，点击可以触发导航或增删元素。

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{StepError, StepResult};
use crate::infrastructure::session::{DocumentScope, ElementState, Selector, Session};

/// 点击后的页面变化
#[derive(Debug, Clone, Default)]
pub struct ClickEffect {
    pub navigate: Option<String>,
    pub insert: Vec<(DocumentScope, Selector, ElementState)>,
    pub remove: Vec<(DocumentScope, Selector)>,
}

#[derive(Default)]
pub struct ScriptedSession {
    url: Mutex<String>,
    title: Mutex<String>,
    frames: AtomicUsize,
    elements: Mutex<HashMap<(DocumentScope, Selector), ElementState>>,
    effects: Mutex<HashMap<Selector, ClickEffect>>,
    failure: Mutex<Option<StepError>>,
    transient: Mutex<Vec<StepError>>,
    evaluate_result: Mutex<Option<JsonValue>>,
    close_failure: Mutex<Option<StepError>>,
    pub gotos: Mutex<Vec<String>>,
    pub clicks: Mutex<Vec<Selector>>,
    pub fills: Mutex<Vec<(Selector, String)>>,
    pub closed: AtomicBool,
}

impl ScriptedSession {
    pub fn new(url: &str) -> Self {
        let session = Self::default();
        *session.url.lock().unwrap() = url.to_string();
        session
    }

    pub fn set_title(&self, title: &str) {
        *self.title.lock().unwrap() = title.to_string();
    }

    pub fn set_url(&self, url: &str) {
        *self.url.lock().unwrap() = url.to_string();
    }

    pub fn set_frames(&self, count: usize) {
        self.frames.store(count, Ordering::SeqCst);
    }

    pub fn put(&self, scope: DocumentScope, selector: Selector, state: ElementState) {
        self.elements.lock().unwrap().insert((scope, selector), state);
    }

    pub fn remove(&self, scope: DocumentScope, selector: &Selector) {
        self.elements.lock().unwrap().remove(&(scope, selector.clone()));
    }

    pub fn on_click(&self, selector: Selector, effect: ClickEffect) {
        self.effects.lock().unwrap().insert(selector, effect);
    }

    pub fn fail_with(&self, err: StepError) {
        *self.failure.lock().unwrap() = Some(err);
    }

    /// 下一次调用失败一次，之后恢复正常
    pub fn fail_once(&self, err: StepError) {
        self.transient.lock().unwrap().push(err);
    }

    pub fn fail_close(&self, err: StepError) {
        *self.close_failure.lock().unwrap() = Some(err);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn set_evaluate_result(&self, value: JsonValue) {
        *self.evaluate_result.lock().unwrap() = Some(value);
    }

    pub fn goto_count(&self) -> usize {
        self.gotos.lock().unwrap().len()
    }

    fn check(&self) -> StepResult<()> {
        if let Some(err) = self.failure.lock().unwrap().as_ref() {
            return Err(err.clone());
        }
        match self.transient.lock().unwrap().pop() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Session for ScriptedSession {
    async fn goto(&self, url: &str) -> StepResult<()> {
        self.gotos.lock().unwrap().push(url.to_string());
        self.check()?;
        self.set_url(url);
        Ok(())
    }

    async fn current_url(&self) -> StepResult<String> {
        self.check()?;
        Ok(self.url.lock().unwrap().clone())
    }

    async fn title(&self) -> StepResult<String> {
        self.check()?;
        Ok(self.title.lock().unwrap().clone())
    }

    async fn frame_count(&self) -> StepResult<usize> {
        self.check()?;
        Ok(self.frames.load(Ordering::SeqCst))
    }

    async fn inspect(&self, scope: DocumentScope, selector: &Selector) -> StepResult<Option<ElementState>> {
        self.check()?;
        Ok(self
            .elements
            .lock()
            .unwrap()
            .get(&(scope, selector.clone()))
            .cloned())
    }

    async fn fill(&self, scope: DocumentScope, selector: &Selector, value: &str) -> StepResult<()> {
        self.check()?;
        if !self.elements.lock().unwrap().contains_key(&(scope, selector.clone())) {
            return Err(StepError::StaleReference {
                what: selector.to_string(),
            });
        }
        self.fills
            .lock()
            .unwrap()
            .push((selector.clone(), value.to_string()));
        Ok(())
    }

    async fn click(&self, scope: DocumentScope, selector: &Selector) -> StepResult<()> {
        self.check()?;
        if !self.elements.lock().unwrap().contains_key(&(scope, selector.clone())) {
            return Err(StepError::StaleReference {
                what: selector.to_string(),
            });
        }
        self.clicks.lock().unwrap().push(selector.clone());
        let effect = self.effects.lock().unwrap().get(selector).cloned();
        if let Some(effect) = effect {
            if let Some(url) = effect.navigate {
                self.set_url(&url);
            }
            for (scope, sel) in effect.remove {
                self.remove(scope, &sel);
            }
            for (scope, sel, state) in effect.insert {
                self.put(scope, sel, state);
            }
        }
        Ok(())
    }

    async fn evaluate(&self, _script: &str) -> StepResult<JsonValue> {
        self.check()?;
        Ok(self
            .evaluate_result
            .lock()
            .unwrap()
            .clone()
            .unwrap_or(JsonValue::Bool(false)))
    }

    async fn close(&self) -> StepResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        match self.close_failure.lock().unwrap().as_ref() {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

/// 让测试在把会话交给批次之后仍能检查它
#[async_trait]
impl<T: Session + ?Sized> Session for Arc<T> {
    async fn goto(&self, url: &str) -> StepResult<()> {
        (**self).goto(url).await
    }

    async fn current_url(&self) -> StepResult<String> {
        (**self).current_url().await
    }

    async fn title(&self) -> StepResult<String> {
        (**self).title().await
    }

    async fn frame_count(&self) -> StepResult<usize> {
        (**self).frame_count().await
    }

    async fn inspect(&self, scope: DocumentScope, selector: &Selector) -> StepResult<Option<ElementState>> {
        (**self).inspect(scope, selector).await
    }

    async fn fill(&self, scope: DocumentScope, selector: &Selector, value: &str) -> StepResult<()> {
        (**self).fill(scope, selector, value).await
    }

    async fn click(&self, scope: DocumentScope, selector: &Selector) -> StepResult<()> {
        (**self).click(scope, selector).await
    }

    async fn evaluate(&self, script: &str) -> StepResult<JsonValue> {
        (**self).evaluate(script).await
    }

    async fn close(&self) -> StepResult<()> {
        (**self).close().await
    }
}
