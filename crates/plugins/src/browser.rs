//! Browser page actions.
//!
//! Thin adapters from action configs to the [`Page`](quasar_driver::Page)
//! port. Every string field passes through the variable resolver before
//! reaching the driver, so configs may embed `{{...}}` placeholders.

use async_trait::async_trait;
use quasar_action::{ActionContext, ActionError, ActionHandler, Interpreter};
use quasar_driver::{
    ClickOptions, GotoOptions, ImageFormat, LoadState, ScreenshotOptions, SelectTarget,
    SelectorState, WaitForSelectorOptions,
};
use quasar_expression::VariableScope;
use quasar_run::RunEvent;
use quasar_storage::content_type_for_key;
use serde::Deserialize;
use serde_json::Value;

use crate::config::parse_config;

#[derive(Debug, Deserialize)]
struct GotoConfig {
    url: String,
    #[serde(default)]
    timeout: Option<u64>,
    #[serde(default)]
    wait_until: Option<LoadState>,
}

/// `browser:goto` — navigate to a URL.
pub struct Goto;

#[async_trait]
impl ActionHandler for Goto {
    fn kind(&self) -> &'static str {
        "browser:goto"
    }

    async fn execute(
        &self,
        ctx: &mut ActionContext,
        config: &Value,
        _interpreter: &Interpreter,
    ) -> Result<(), ActionError> {
        let cfg: GotoConfig = parse_config(ctx, config)?;
        let opts = GotoOptions {
            timeout: cfg.timeout,
            wait_until: cfg.wait_until,
        };
        ctx.page().goto(&cfg.url, opts).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ClickConfig {
    selector: String,
    #[serde(flatten)]
    opts: ClickOptions,
}

/// `browser:click` — click an element.
pub struct Click;

#[async_trait]
impl ActionHandler for Click {
    fn kind(&self) -> &'static str {
        "browser:click"
    }

    async fn execute(
        &self,
        ctx: &mut ActionContext,
        config: &Value,
        _interpreter: &Interpreter,
    ) -> Result<(), ActionError> {
        let cfg: ClickConfig = parse_config(ctx, config)?;
        ctx.page().click(&cfg.selector, cfg.opts).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct FillConfig {
    selector: String,
    value: String,
    #[serde(default)]
    force: bool,
}

/// `browser:fill` — clear and fill an input.
pub struct Fill;

#[async_trait]
impl ActionHandler for Fill {
    fn kind(&self) -> &'static str {
        "browser:fill"
    }

    async fn execute(
        &self,
        ctx: &mut ActionContext,
        config: &Value,
        _interpreter: &Interpreter,
    ) -> Result<(), ActionError> {
        let cfg: FillConfig = parse_config(ctx, config)?;
        ctx.page().fill(&cfg.selector, &cfg.value, cfg.force).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct TypeConfig {
    selector: String,
    text: String,
    #[serde(default)]
    delay: Option<u64>,
}

/// `browser:type` — type text key by key.
pub struct Type;

#[async_trait]
impl ActionHandler for Type {
    fn kind(&self) -> &'static str {
        "browser:type"
    }

    async fn execute(
        &self,
        ctx: &mut ActionContext,
        config: &Value,
        _interpreter: &Interpreter,
    ) -> Result<(), ActionError> {
        let cfg: TypeConfig = parse_config(ctx, config)?;
        ctx.page()
            .type_text(&cfg.selector, &cfg.text, cfg.delay)
            .await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct PressConfig {
    selector: String,
    key: String,
    #[serde(default)]
    delay: Option<u64>,
}

/// `browser:press` — press a named key on an element.
pub struct Press;

#[async_trait]
impl ActionHandler for Press {
    fn kind(&self) -> &'static str {
        "browser:press"
    }

    async fn execute(
        &self,
        ctx: &mut ActionContext,
        config: &Value,
        _interpreter: &Interpreter,
    ) -> Result<(), ActionError> {
        let cfg: PressConfig = parse_config(ctx, config)?;
        ctx.page().press(&cfg.selector, &cfg.key, cfg.delay).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct SelectorConfig {
    selector: String,
}

/// `browser:check` — check a checkbox or radio button.
pub struct Check;

#[async_trait]
impl ActionHandler for Check {
    fn kind(&self) -> &'static str {
        "browser:check"
    }

    async fn execute(
        &self,
        ctx: &mut ActionContext,
        config: &Value,
        _interpreter: &Interpreter,
    ) -> Result<(), ActionError> {
        let cfg: SelectorConfig = parse_config(ctx, config)?;
        ctx.page().check(&cfg.selector).await?;
        Ok(())
    }
}

/// `browser:uncheck` — uncheck a checkbox.
pub struct Uncheck;

#[async_trait]
impl ActionHandler for Uncheck {
    fn kind(&self) -> &'static str {
        "browser:uncheck"
    }

    async fn execute(
        &self,
        ctx: &mut ActionContext,
        config: &Value,
        _interpreter: &Interpreter,
    ) -> Result<(), ActionError> {
        let cfg: SelectorConfig = parse_config(ctx, config)?;
        ctx.page().uncheck(&cfg.selector).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct SelectOptionConfig {
    selector: String,
    #[serde(flatten)]
    target: SelectTarget,
}

/// `browser:select_option` — choose an option by value, label, or index.
pub struct SelectOption;

#[async_trait]
impl ActionHandler for SelectOption {
    fn kind(&self) -> &'static str {
        "browser:select_option"
    }

    async fn execute(
        &self,
        ctx: &mut ActionContext,
        config: &Value,
        _interpreter: &Interpreter,
    ) -> Result<(), ActionError> {
        let cfg: SelectOptionConfig = parse_config(ctx, config)?;
        ctx.page().select_option(&cfg.selector, cfg.target).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct WaitForSelectorConfig {
    selector: String,
    #[serde(default)]
    timeout: Option<u64>,
    #[serde(default)]
    state: SelectorState,
}

/// `browser:wait_for_selector` — wait for an element state.
pub struct WaitForSelector;

#[async_trait]
impl ActionHandler for WaitForSelector {
    fn kind(&self) -> &'static str {
        "browser:wait_for_selector"
    }

    async fn execute(
        &self,
        ctx: &mut ActionContext,
        config: &Value,
        _interpreter: &Interpreter,
    ) -> Result<(), ActionError> {
        let cfg: WaitForSelectorConfig = parse_config(ctx, config)?;
        let opts = WaitForSelectorOptions {
            timeout: cfg.timeout,
            state: cfg.state,
        };
        ctx.page().wait_for_selector(&cfg.selector, opts).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct WaitForTimeoutConfig {
    #[serde(alias = "ms")]
    timeout: u64,
}

/// `browser:wait_for_timeout` — unconditional bounded wait.
pub struct WaitForTimeout;

#[async_trait]
impl ActionHandler for WaitForTimeout {
    fn kind(&self) -> &'static str {
        "browser:wait_for_timeout"
    }

    async fn execute(
        &self,
        ctx: &mut ActionContext,
        config: &Value,
        _interpreter: &Interpreter,
    ) -> Result<(), ActionError> {
        let cfg: WaitForTimeoutConfig = parse_config(ctx, config)?;
        tokio::select! {
            () = tokio::time::sleep(std::time::Duration::from_millis(cfg.timeout)) => Ok(()),
            () = ctx.cancellation.cancelled() => Err(ActionError::Cancelled),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WaitForLoadStateConfig {
    #[serde(default)]
    state: LoadState,
    #[serde(default)]
    timeout: Option<u64>,
}

/// `browser:wait_for_load_state` — wait for a readiness milestone.
pub struct WaitForLoadState;

#[async_trait]
impl ActionHandler for WaitForLoadState {
    fn kind(&self) -> &'static str {
        "browser:wait_for_load_state"
    }

    async fn execute(
        &self,
        ctx: &mut ActionContext,
        config: &Value,
        _interpreter: &Interpreter,
    ) -> Result<(), ActionError> {
        let cfg: WaitForLoadStateConfig = parse_config(ctx, config)?;
        ctx.page().wait_for_load_state(cfg.state, cfg.timeout).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ScreenshotActionConfig {
    #[serde(default)]
    full_page: bool,
    #[serde(default)]
    quality: Option<u8>,
    #[serde(default)]
    format: ImageFormat,
    #[serde(default)]
    upload_to_storage: bool,
    #[serde(default)]
    storage_key: Option<String>,
}

/// `browser:screenshot` — capture the page, optionally publishing the
/// bytes through the object store as an `output_file` event.
pub struct Screenshot;

#[async_trait]
impl ActionHandler for Screenshot {
    fn kind(&self) -> &'static str {
        "browser:screenshot"
    }

    async fn execute(
        &self,
        ctx: &mut ActionContext,
        config: &Value,
        _interpreter: &Interpreter,
    ) -> Result<(), ActionError> {
        let cfg: ScreenshotActionConfig = parse_config(ctx, config)?;
        let opts = ScreenshotOptions {
            full_page: cfg.full_page,
            quality: cfg.quality,
            format: cfg.format,
        };
        let bytes = ctx.page().screenshot(opts).await?;

        if cfg.upload_to_storage {
            let extension = match cfg.format {
                ImageFormat::Png => "png",
                ImageFormat::Jpeg => "jpg",
            };
            let key = match cfg.storage_key {
                Some(key) => key,
                None => ctx.resolve_str(&format!(
                    "screenshots/{{{{runId}}}}/{{{{loopIndex}}}}-{{{{timestamp}}}}.{extension}"
                ))?,
            };
            let url = ctx
                .store()
                .upload(&key, bytes, content_type_for_key(&key))
                .await?;
            ctx.emit(RunEvent::output_file(url));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct EvaluateConfig {
    expression: String,
    #[serde(default)]
    save_as: Option<String>,
    #[serde(default)]
    scope: VariableScope,
}

/// `browser:evaluate` — run a JavaScript expression in the page.
pub struct Evaluate;

#[async_trait]
impl ActionHandler for Evaluate {
    fn kind(&self) -> &'static str {
        "browser:evaluate"
    }

    async fn execute(
        &self,
        ctx: &mut ActionContext,
        config: &Value,
        _interpreter: &Interpreter,
    ) -> Result<(), ActionError> {
        let cfg: EvaluateConfig = parse_config(ctx, config)?;
        let result = ctx.page().evaluate(&cfg.expression).await?;
        if let Some(save_as) = cfg.save_as {
            ctx.vars.set_runtime_path(&save_as, result, cfg.scope);
        }
        Ok(())
    }
}

/// `browser:hover` — hover over an element.
pub struct Hover;

#[async_trait]
impl ActionHandler for Hover {
    fn kind(&self) -> &'static str {
        "browser:hover"
    }

    async fn execute(
        &self,
        ctx: &mut ActionContext,
        config: &Value,
        _interpreter: &Interpreter,
    ) -> Result<(), ActionError> {
        let cfg: SelectorConfig = parse_config(ctx, config)?;
        ctx.page().hover(&cfg.selector).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ScrollConfig {
    #[serde(default)]
    delta_x: i64,
    #[serde(default)]
    delta_y: i64,
}

/// `browser:scroll` — scroll by pixel deltas.
pub struct Scroll;

#[async_trait]
impl ActionHandler for Scroll {
    fn kind(&self) -> &'static str {
        "browser:scroll"
    }

    async fn execute(
        &self,
        ctx: &mut ActionContext,
        config: &Value,
        _interpreter: &Interpreter,
    ) -> Result<(), ActionError> {
        let cfg: ScrollConfig = parse_config(ctx, config)?;
        ctx.page().scroll(cfg.delta_x, cfg.delta_y).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct GetTextConfig {
    selector: String,
    #[serde(default)]
    save_as: Option<String>,
    #[serde(default)]
    scope: VariableScope,
}

/// `browser:get_text` — read an element's inner text into the runtime
/// scope.
pub struct GetText;

#[async_trait]
impl ActionHandler for GetText {
    fn kind(&self) -> &'static str {
        "browser:get_text"
    }

    async fn execute(
        &self,
        ctx: &mut ActionContext,
        config: &Value,
        _interpreter: &Interpreter,
    ) -> Result<(), ActionError> {
        let cfg: GetTextConfig = parse_config(ctx, config)?;
        let text = ctx.page().get_text(&cfg.selector).await?;
        if let Some(save_as) = cfg.save_as {
            ctx.vars
                .set_runtime_path(&save_as, Value::String(text), cfg.scope);
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct GetAttributeConfig {
    selector: String,
    attribute: String,
    #[serde(default)]
    save_as: Option<String>,
    #[serde(default)]
    scope: VariableScope,
}

/// `browser:get_attribute` — read an attribute into the runtime scope.
pub struct GetAttribute;

#[async_trait]
impl ActionHandler for GetAttribute {
    fn kind(&self) -> &'static str {
        "browser:get_attribute"
    }

    async fn execute(
        &self,
        ctx: &mut ActionContext,
        config: &Value,
        _interpreter: &Interpreter,
    ) -> Result<(), ActionError> {
        let cfg: GetAttributeConfig = parse_config(ctx, config)?;
        let value = ctx
            .page()
            .get_attribute(&cfg.selector, &cfg.attribute)
            .await?;
        if let Some(save_as) = cfg.save_as {
            let value = value.map_or(Value::Null, Value::String);
            ctx.vars.set_runtime_path(&save_as, value, cfg.scope);
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct SetViewportConfig {
    width: u32,
    height: u32,
}

/// `browser:set_viewport` — resize the viewport.
pub struct SetViewport;

#[async_trait]
impl ActionHandler for SetViewport {
    fn kind(&self) -> &'static str {
        "browser:set_viewport"
    }

    async fn execute(
        &self,
        ctx: &mut ActionContext,
        config: &Value,
        _interpreter: &Interpreter,
    ) -> Result<(), ActionError> {
        let cfg: SetViewportConfig = parse_config(ctx, config)?;
        ctx.page().set_viewport(cfg.width, cfg.height).await?;
        Ok(())
    }
}

/// `browser:reload` — reload the current page.
pub struct Reload;

#[async_trait]
impl ActionHandler for Reload {
    fn kind(&self) -> &'static str {
        "browser:reload"
    }

    async fn execute(
        &self,
        ctx: &mut ActionContext,
        _config: &Value,
        _interpreter: &Interpreter,
    ) -> Result<(), ActionError> {
        ctx.page().reload().await?;
        Ok(())
    }
}

/// `browser:go_back` — navigate back in history.
pub struct GoBack;

#[async_trait]
impl ActionHandler for GoBack {
    fn kind(&self) -> &'static str {
        "browser:go_back"
    }

    async fn execute(
        &self,
        ctx: &mut ActionContext,
        _config: &Value,
        _interpreter: &Interpreter,
    ) -> Result<(), ActionError> {
        ctx.page().go_back().await?;
        Ok(())
    }
}

/// `browser:go_forward` — navigate forward in history.
pub struct GoForward;

#[async_trait]
impl ActionHandler for GoForward {
    fn kind(&self) -> &'static str {
        "browser:go_forward"
    }

    async fn execute(
        &self,
        ctx: &mut ActionContext,
        _config: &Value,
        _interpreter: &Interpreter,
    ) -> Result<(), ActionError> {
        ctx.page().go_forward().await?;
        Ok(())
    }
}
