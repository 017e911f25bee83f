//! Shared config parsing for plugins.

use quasar_action::{ActionContext, ActionError};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Resolve every template in `config`, then deserialize it into the
/// plugin's typed config struct.
///
/// Control-flow plugins must NOT use this on their whole config — nested
/// action configs have to stay unresolved until their own dispatch — and
/// instead parse raw and resolve individual scalar fields.
pub fn parse_config<T: DeserializeOwned>(
    ctx: &ActionContext,
    config: &Value,
) -> Result<T, ActionError> {
    let resolved = ctx.resolve_value(config)?;
    serde_json::from_value(resolved)
        .map_err(|err| ActionError::validation(format!("invalid config: {err}")))
}

/// Deserialize without resolving templates (control-flow configs).
pub(crate) fn parse_raw<T: DeserializeOwned>(config: &Value) -> Result<T, ActionError> {
    serde_json::from_value(config.clone())
        .map_err(|err| ActionError::validation(format!("invalid config: {err}")))
}
