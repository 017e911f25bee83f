//! Object storage actions.

use async_trait::async_trait;
use bytes::Bytes;
use quasar_action::{ActionContext, ActionError, ActionHandler, Interpreter};
use quasar_expression::VariableScope;
use quasar_run::RunEvent;
use quasar_storage::content_type_for_key;
use serde::Deserialize;
use serde_json::Value;

use crate::config::parse_config;

#[derive(Debug, Deserialize)]
struct UploadConfig {
    key: String,
    content: String,
    #[serde(default)]
    content_type: Option<String>,
}

/// `storage:upload` — store content under a key and emit the public URL
/// as an `output_file` event.
pub struct Upload;

#[async_trait]
impl ActionHandler for Upload {
    fn kind(&self) -> &'static str {
        "storage:upload"
    }

    async fn execute(
        &self,
        ctx: &mut ActionContext,
        config: &Value,
        _interpreter: &Interpreter,
    ) -> Result<(), ActionError> {
        let cfg: UploadConfig = parse_config(ctx, config)?;
        let content_type = cfg
            .content_type
            .unwrap_or_else(|| content_type_for_key(&cfg.key).to_string());
        let url = ctx
            .store()
            .upload(&cfg.key, Bytes::from(cfg.content.into_bytes()), &content_type)
            .await?;
        ctx.emit(RunEvent::output_file(url));
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct DeleteConfig {
    key: String,
}

/// `storage:delete` — remove an object.
pub struct Delete;

#[async_trait]
impl ActionHandler for Delete {
    fn kind(&self) -> &'static str {
        "storage:delete"
    }

    async fn execute(
        &self,
        ctx: &mut ActionContext,
        config: &Value,
        _interpreter: &Interpreter,
    ) -> Result<(), ActionError> {
        let cfg: DeleteConfig = parse_config(ctx, config)?;
        ctx.store().delete(&cfg.key).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ListConfig {
    #[serde(default)]
    prefix: String,
    #[serde(default)]
    save_as: Option<String>,
    #[serde(default)]
    scope: VariableScope,
}

/// `storage:list` — enumerate keys under a prefix into the runtime
/// scope.
pub struct List;

#[async_trait]
impl ActionHandler for List {
    fn kind(&self) -> &'static str {
        "storage:list"
    }

    async fn execute(
        &self,
        ctx: &mut ActionContext,
        config: &Value,
        _interpreter: &Interpreter,
    ) -> Result<(), ActionError> {
        let cfg: ListConfig = parse_config(ctx, config)?;
        let keys = ctx.store().list(&cfg.prefix).await?;
        if let Some(save_as) = cfg.save_as {
            let value = Value::Array(keys.into_iter().map(Value::String).collect());
            ctx.vars.set_runtime_path(&save_as, value, cfg.scope);
        }
        Ok(())
    }
}
