//! Option surface for page operations.
//!
//! These mirror the conventional browser-automation option names so
//! action configs deserialize straight into them.

use serde::{Deserialize, Serialize};

/// When a navigation is considered finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    /// The `load` event fired.
    #[default]
    Load,
    /// The `DOMContentLoaded` event fired.
    Domcontentloaded,
    /// No network connections for at least 500 ms.
    Networkidle,
}

/// Navigation options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GotoOptions {
    /// Navigation timeout in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// Readiness milestone to wait for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_until: Option<LoadState>,
}

/// Mouse button for click actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    /// Primary button.
    #[default]
    Left,
    /// Wheel button.
    Middle,
    /// Secondary button.
    Right,
}

/// Click options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClickOptions {
    /// Which button to press.
    #[serde(default)]
    pub button: MouseButton,
    /// Number of clicks (2 for double-click).
    #[serde(default = "default_click_count")]
    pub click_count: u32,
    /// Skip actionability checks.
    #[serde(default)]
    pub force: bool,
}

fn default_click_count() -> u32 {
    1
}

/// Target of a `select_option` action. Exactly one variant applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectTarget {
    /// Match by option value.
    Value(String),
    /// Match several values (multi-select).
    Values(Vec<String>),
    /// Match by visible label.
    Label(String),
    /// Match by option position.
    Index(usize),
}

/// Element lifecycle states for `wait_for_selector`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorState {
    /// Present in the DOM and visible.
    #[default]
    Visible,
    /// Present in the DOM.
    Attached,
    /// Removed from the DOM.
    Detached,
    /// Present but not visible.
    Hidden,
}

/// Options for `wait_for_selector`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WaitForSelectorOptions {
    /// Wait timeout in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// State to wait for.
    #[serde(default)]
    pub state: SelectorState,
}

/// Screenshot encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormat {
    /// Lossless.
    #[default]
    Png,
    /// Lossy, honors `quality`.
    Jpeg,
}

/// Screenshot options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScreenshotOptions {
    /// Capture the full scrollable page rather than the viewport.
    #[serde(default)]
    pub full_page: bool,
    /// JPEG quality (0-100); ignored for PNG.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<u8>,
    /// Output encoding.
    #[serde(default)]
    pub format: ImageFormat,
}

/// Queryable element conditions, used by conditional control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementState {
    /// Element accepts input.
    IsEnabled,
    /// Element rejects input.
    IsDisabled,
    /// Element is rendered.
    IsVisible,
    /// Element is not rendered.
    IsHidden,
    /// Checkbox/radio is checked.
    IsChecked,
    /// Element is editable.
    IsEditable,
}
