//! Scripted driver doubles for tests.
//!
//! [`ScriptedPage`] records every call in order and replays answers
//! configured up front, so plugin and runner tests can assert exactly
//! what the interpreter asked the browser to do without a real backend.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{DriverError, DriverResult};
use crate::options::{
    ClickOptions, ElementState, GotoOptions, LoadState, ScreenshotOptions, SelectTarget,
    WaitForSelectorOptions,
};
use crate::page::{BrowserDriver, Page};

#[derive(Debug, Default)]
struct Script {
    texts: HashMap<String, String>,
    attributes: HashMap<(String, String), String>,
    states: HashMap<(String, ElementState), bool>,
    eval_results: HashMap<String, Value>,
    failures: HashMap<String, DriverError>,
    screenshot: Option<Bytes>,
}

/// A [`Page`] double that records calls and replays scripted answers.
///
/// Unscripted queries return neutral defaults (empty text, `null`
/// evaluation, `false` element state) so tests only configure what they
/// assert on.
#[derive(Debug, Default)]
pub struct ScriptedPage {
    script: Mutex<Script>,
    calls: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl ScriptedPage {
    /// Create a page with no scripted answers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the text returned by `get_text` for a selector.
    pub fn script_text(&self, selector: impl Into<String>, text: impl Into<String>) {
        self.script.lock().texts.insert(selector.into(), text.into());
    }

    /// Script an attribute value for a selector.
    pub fn script_attribute(
        &self,
        selector: impl Into<String>,
        attribute: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.script
            .lock()
            .attributes
            .insert((selector.into(), attribute.into()), value.into());
    }

    /// Script an element-state query result.
    pub fn script_state(&self, selector: impl Into<String>, state: ElementState, result: bool) {
        self.script
            .lock()
            .states
            .insert((selector.into(), state), result);
    }

    /// Script an evaluation result for an expression.
    pub fn script_eval(&self, expression: impl Into<String>, result: Value) {
        self.script
            .lock()
            .eval_results
            .insert(expression.into(), result);
    }

    /// Make a method (by name, e.g. `"click"`) fail with the given error.
    pub fn script_failure(&self, method: impl Into<String>, error: DriverError) {
        self.script.lock().failures.insert(method.into(), error);
    }

    /// Set the bytes returned by `screenshot`.
    pub fn script_screenshot(&self, bytes: impl Into<Bytes>) {
        self.script.lock().screenshot = Some(bytes.into());
    }

    /// Every call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Whether `close` was called.
    #[must_use]
    pub fn was_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }

    fn check_failure(&self, method: &str) -> DriverResult<()> {
        match self.script.lock().failures.get(method) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Page for ScriptedPage {
    async fn goto(&self, url: &str, _opts: GotoOptions) -> DriverResult<()> {
        self.record(format!("goto {url}"));
        self.check_failure("goto")
    }

    async fn click(&self, selector: &str, _opts: ClickOptions) -> DriverResult<()> {
        self.record(format!("click {selector}"));
        self.check_failure("click")
    }

    async fn fill(&self, selector: &str, value: &str, _force: bool) -> DriverResult<()> {
        self.record(format!("fill {selector} {value}"));
        self.check_failure("fill")
    }

    async fn type_text(
        &self,
        selector: &str,
        text: &str,
        _delay_ms: Option<u64>,
    ) -> DriverResult<()> {
        self.record(format!("type {selector} {text}"));
        self.check_failure("type")
    }

    async fn press(&self, selector: &str, key: &str, _delay_ms: Option<u64>) -> DriverResult<()> {
        self.record(format!("press {selector} {key}"));
        self.check_failure("press")
    }

    async fn check(&self, selector: &str) -> DriverResult<()> {
        self.record(format!("check {selector}"));
        self.check_failure("check")
    }

    async fn uncheck(&self, selector: &str) -> DriverResult<()> {
        self.record(format!("uncheck {selector}"));
        self.check_failure("uncheck")
    }

    async fn select_option(&self, selector: &str, target: SelectTarget) -> DriverResult<()> {
        self.record(format!("select_option {selector} {target:?}"));
        self.check_failure("select_option")
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        _opts: WaitForSelectorOptions,
    ) -> DriverResult<()> {
        self.record(format!("wait_for_selector {selector}"));
        self.check_failure("wait_for_selector")
    }

    async fn wait_for_load_state(
        &self,
        state: LoadState,
        _timeout_ms: Option<u64>,
    ) -> DriverResult<()> {
        self.record(format!("wait_for_load_state {state:?}"));
        self.check_failure("wait_for_load_state")
    }

    async fn screenshot(&self, _opts: ScreenshotOptions) -> DriverResult<Bytes> {
        self.record("screenshot".into());
        self.check_failure("screenshot")?;
        let scripted = self.script.lock().screenshot.clone();
        Ok(scripted.unwrap_or_else(|| Bytes::from_static(b"\x89PNG\r\n\x1a\nstub")))
    }

    async fn evaluate(&self, expression: &str) -> DriverResult<Value> {
        self.record(format!("evaluate {expression}"));
        self.check_failure("evaluate")?;
        Ok(self
            .script
            .lock()
            .eval_results
            .get(expression)
            .cloned()
            .unwrap_or(Value::Null))
    }

    async fn hover(&self, selector: &str) -> DriverResult<()> {
        self.record(format!("hover {selector}"));
        self.check_failure("hover")
    }

    async fn scroll(&self, delta_x: i64, delta_y: i64) -> DriverResult<()> {
        self.record(format!("scroll {delta_x} {delta_y}"));
        self.check_failure("scroll")
    }

    async fn get_text(&self, selector: &str) -> DriverResult<String> {
        self.record(format!("get_text {selector}"));
        self.check_failure("get_text")?;
        Ok(self
            .script
            .lock()
            .texts
            .get(selector)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_attribute(
        &self,
        selector: &str,
        attribute: &str,
    ) -> DriverResult<Option<String>> {
        self.record(format!("get_attribute {selector} {attribute}"));
        self.check_failure("get_attribute")?;
        Ok(self
            .script
            .lock()
            .attributes
            .get(&(selector.to_string(), attribute.to_string()))
            .cloned())
    }

    async fn set_viewport(&self, width: u32, height: u32) -> DriverResult<()> {
        self.record(format!("set_viewport {width}x{height}"));
        self.check_failure("set_viewport")
    }

    async fn reload(&self) -> DriverResult<()> {
        self.record("reload".into());
        self.check_failure("reload")
    }

    async fn go_back(&self) -> DriverResult<()> {
        self.record("go_back".into());
        self.check_failure("go_back")
    }

    async fn go_forward(&self) -> DriverResult<()> {
        self.record("go_forward".into());
        self.check_failure("go_forward")
    }

    async fn element_state(&self, selector: &str, state: ElementState) -> DriverResult<bool> {
        self.record(format!("element_state {selector} {state:?}"));
        self.check_failure("element_state")?;
        Ok(self
            .script
            .lock()
            .states
            .get(&(selector.to_string(), state))
            .copied()
            .unwrap_or(false))
    }

    async fn close(&self) -> DriverResult<()> {
        self.record("close".into());
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

type PageSetup = dyn Fn(&ScriptedPage) + Send + Sync;

/// A [`BrowserDriver`] handing out [`ScriptedPage`]s and retaining
/// handles to every page it created, for post-run assertions.
#[derive(Default)]
pub struct ScriptedDriver {
    setup: Option<Arc<PageSetup>>,
    pages: Mutex<Vec<Arc<ScriptedPage>>>,
}

impl ScriptedDriver {
    /// A driver handing out unscripted pages.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A driver applying `setup` to every page it creates.
    #[must_use]
    pub fn with_setup(setup: impl Fn(&ScriptedPage) + Send + Sync + 'static) -> Self {
        Self {
            setup: Some(Arc::new(setup)),
            pages: Mutex::new(Vec::new()),
        }
    }

    /// Every page created so far, in creation order.
    #[must_use]
    pub fn pages(&self) -> Vec<Arc<ScriptedPage>> {
        self.pages.lock().clone()
    }
}

#[async_trait]
impl BrowserDriver for ScriptedDriver {
    async fn new_page(&self) -> DriverResult<Arc<dyn Page>> {
        let page = Arc::new(ScriptedPage::new());
        if let Some(setup) = &self.setup {
            setup(&page);
        }
        self.pages.lock().push(Arc::clone(&page));
        Ok(page)
    }
}
