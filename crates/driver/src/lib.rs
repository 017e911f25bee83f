//! Browser driver port.
//!
//! The runner never talks to a real browser directly; it drives a
//! [`Page`], the abstraction an embedding process implements on top of
//! its automation backend (CDP, WebDriver, a remote grid). One page is
//! owned exclusively by one user for the user's lifetime.
//!
//! [`testing::ScriptedPage`] is the in-repo implementation: it records
//! every call and replays configured answers, which is what the plugin
//! and runner test suites drive against.

pub mod error;
pub mod options;
pub mod page;
pub mod testing;

pub use error::{DriverError, DriverResult};
pub use options::{
    ClickOptions, ElementState, GotoOptions, ImageFormat, LoadState, MouseButton,
    ScreenshotOptions, SelectTarget, SelectorState, WaitForSelectorOptions,
};
pub use page::{BrowserDriver, Page};
