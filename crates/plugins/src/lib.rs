//! Builtin action plugins.
//!
//! Four families: `browser:*` page primitives, `http:*` request verbs,
//! `storage:*` object operations, and `flow:*` control flow.
//! [`builtin_registry`] assembles the full set; tests and embedders can
//! build narrower registries from the individual handlers.

pub mod browser;
pub mod flow;
pub mod http;
pub mod storage;

mod config;

pub use config::parse_config;

use std::sync::Arc;

use quasar_action::Registry;

/// A registry holding every builtin action.
#[must_use]
pub fn builtin_registry() -> Registry {
    let client = reqwest::Client::new();
    let mut builder = Registry::builder()
        // Browser primitives
        .register(Arc::new(browser::Goto))
        .register(Arc::new(browser::Click))
        .register(Arc::new(browser::Fill))
        .register(Arc::new(browser::Type))
        .register(Arc::new(browser::Press))
        .register(Arc::new(browser::Check))
        .register(Arc::new(browser::Uncheck))
        .register(Arc::new(browser::SelectOption))
        .register(Arc::new(browser::WaitForSelector))
        .register(Arc::new(browser::WaitForTimeout))
        .register(Arc::new(browser::WaitForLoadState))
        .register(Arc::new(browser::Screenshot))
        .register(Arc::new(browser::Evaluate))
        .register(Arc::new(browser::Hover))
        .register(Arc::new(browser::Scroll))
        .register(Arc::new(browser::GetText))
        .register(Arc::new(browser::GetAttribute))
        .register(Arc::new(browser::SetViewport))
        .register(Arc::new(browser::Reload))
        .register(Arc::new(browser::GoBack))
        .register(Arc::new(browser::GoForward))
        // Storage verbs
        .register(Arc::new(storage::Upload))
        .register(Arc::new(storage::Delete))
        .register(Arc::new(storage::List))
        // Control flow
        .register(Arc::new(flow::If))
        .register(Arc::new(flow::Loop))
        .register(Arc::new(flow::Log));
    // HTTP verbs share one connection pool
    for handler in http::all_verbs(client) {
        builder = builder.register(handler);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_covers_all_families() {
        let registry = builtin_registry();
        for kind in [
            "browser:goto",
            "browser:click",
            "browser:fill",
            "browser:type",
            "browser:press",
            "browser:check",
            "browser:uncheck",
            "browser:select_option",
            "browser:wait_for_selector",
            "browser:wait_for_timeout",
            "browser:wait_for_load_state",
            "browser:screenshot",
            "browser:evaluate",
            "browser:hover",
            "browser:scroll",
            "browser:get_text",
            "browser:get_attribute",
            "browser:set_viewport",
            "browser:reload",
            "browser:go_back",
            "browser:go_forward",
            "http:get",
            "http:post",
            "http:put",
            "http:patch",
            "http:delete",
            "storage:upload",
            "storage:delete",
            "storage:list",
            "flow:if",
            "flow:loop",
            "flow:log",
        ] {
            assert!(registry.contains(kind), "missing handler for {kind}");
        }
    }
}
