//! The page and driver port traits.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;

use crate::error::DriverResult;
use crate::options::{
    ClickOptions, ElementState, GotoOptions, LoadState, ScreenshotOptions, SelectTarget,
    WaitForSelectorOptions,
};

/// A single browser page (tab), owned exclusively by one user of a run.
///
/// Implementations are expected to honor per-call timeouts where the
/// option surface carries one and to translate backend failures into
/// [`DriverError`](crate::DriverError) variants.
#[async_trait]
pub trait Page: Send + Sync {
    /// Navigate to a URL.
    async fn goto(&self, url: &str, opts: GotoOptions) -> DriverResult<()>;

    /// Click the element matched by `selector`.
    async fn click(&self, selector: &str, opts: ClickOptions) -> DriverResult<()>;

    /// Clear and fill an input element.
    async fn fill(&self, selector: &str, value: &str, force: bool) -> DriverResult<()>;

    /// Type text key by key, with an optional inter-key delay.
    async fn type_text(&self, selector: &str, text: &str, delay_ms: Option<u64>)
    -> DriverResult<()>;

    /// Press a named key (e.g. `"Enter"`) on an element.
    async fn press(&self, selector: &str, key: &str, delay_ms: Option<u64>) -> DriverResult<()>;

    /// Check a checkbox or radio button.
    async fn check(&self, selector: &str) -> DriverResult<()>;

    /// Uncheck a checkbox.
    async fn uncheck(&self, selector: &str) -> DriverResult<()>;

    /// Select an option in a `<select>` element.
    async fn select_option(&self, selector: &str, target: SelectTarget) -> DriverResult<()>;

    /// Wait for an element to reach a lifecycle state.
    async fn wait_for_selector(
        &self,
        selector: &str,
        opts: WaitForSelectorOptions,
    ) -> DriverResult<()>;

    /// Wait for a page readiness milestone.
    async fn wait_for_load_state(&self, state: LoadState, timeout_ms: Option<u64>)
    -> DriverResult<()>;

    /// Capture a screenshot.
    async fn screenshot(&self, opts: ScreenshotOptions) -> DriverResult<Bytes>;

    /// Evaluate a JavaScript expression in the page, returning its
    /// JSON-serialized result.
    async fn evaluate(&self, expression: &str) -> DriverResult<Value>;

    /// Hover over an element.
    async fn hover(&self, selector: &str) -> DriverResult<()>;

    /// Scroll the page by pixel deltas.
    async fn scroll(&self, delta_x: i64, delta_y: i64) -> DriverResult<()>;

    /// Inner text of an element.
    async fn get_text(&self, selector: &str) -> DriverResult<String>;

    /// An attribute value of an element, `None` when absent.
    async fn get_attribute(&self, selector: &str, attribute: &str)
    -> DriverResult<Option<String>>;

    /// Resize the viewport.
    async fn set_viewport(&self, width: u32, height: u32) -> DriverResult<()>;

    /// Reload the current page.
    async fn reload(&self) -> DriverResult<()>;

    /// Navigate back in history.
    async fn go_back(&self) -> DriverResult<()>;

    /// Navigate forward in history.
    async fn go_forward(&self) -> DriverResult<()>;

    /// Query an element condition (visible, enabled, checked, ...).
    async fn element_state(&self, selector: &str, state: ElementState) -> DriverResult<bool>;

    /// Release the page and its backend resources.
    async fn close(&self) -> DriverResult<()>;
}

/// Factory for pages: one browser session per runner process, one page
/// per user.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Allocate a fresh page for one user.
    async fn new_page(&self) -> DriverResult<Arc<dyn Page>>;
}
