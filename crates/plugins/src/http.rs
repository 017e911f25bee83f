//! HTTP request actions.
//!
//! `http:get|post|put|patch|delete` share one handler parameterized by
//! method, and one connection pool. Auth is declarative: an explicit
//! `auth` block wins; otherwise a non-empty `runtime.access_token`
//! becomes a bearer header and `runtime.api_key` an `X-API-Key` header.
//! `after_hooks` extract subtrees from a JSON response body into the
//! runtime (or global) variable scope.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use quasar_action::{ActionContext, ActionError, ActionHandler, Interpreter};
use quasar_expression::VariableScope;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::parse_config;

/// Declarative request authentication.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    /// `Authorization: Bearer <token>`.
    Bearer {
        /// The token.
        token: String,
    },
    /// `Authorization: Basic <base64(user:pass)>`.
    Basic {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },
    /// An API key header, `X-API-Key` unless overridden.
    ApiKey {
        /// The key value.
        key: String,
        /// Header name override.
        #[serde(default)]
        header: Option<String>,
    },
    /// Arbitrary headers.
    Custom {
        /// Header map, applied verbatim.
        headers: HashMap<String, String>,
    },
}

/// One response extraction: pull `path` from the parsed JSON body and
/// store it under `save_as` in the chosen scope.
#[derive(Debug, Clone, Deserialize)]
pub struct AfterHook {
    /// Dotted path into the response body; `""` or `"."` selects the
    /// whole body.
    #[serde(default)]
    pub path: String,
    /// Runtime variable name to store under.
    pub save_as: String,
    /// Local (per-user) or global (run-wide) scope.
    #[serde(default)]
    pub scope: VariableScope,
}

#[derive(Debug, Deserialize)]
struct HttpConfig {
    url: String,
    #[serde(default)]
    headers: HashMap<String, String>,
    #[serde(default)]
    body: Option<Value>,
    #[serde(default)]
    timeout_ms: Option<u64>,
    #[serde(default)]
    auth: Option<AuthConfig>,
    #[serde(default)]
    after_hooks: Vec<AfterHook>,
}

/// Handler for one HTTP verb.
pub struct HttpRequest {
    kind: &'static str,
    method: reqwest::Method,
    client: reqwest::Client,
}

impl HttpRequest {
    fn new(kind: &'static str, method: reqwest::Method, client: reqwest::Client) -> Self {
        Self {
            kind,
            method,
            client,
        }
    }
}

/// All five verb handlers sharing `client`'s connection pool.
#[must_use]
pub fn all_verbs(client: reqwest::Client) -> Vec<Arc<dyn ActionHandler>> {
    vec![
        Arc::new(HttpRequest::new("http:get", reqwest::Method::GET, client.clone())),
        Arc::new(HttpRequest::new("http:post", reqwest::Method::POST, client.clone())),
        Arc::new(HttpRequest::new("http:put", reqwest::Method::PUT, client.clone())),
        Arc::new(HttpRequest::new("http:patch", reqwest::Method::PATCH, client.clone())),
        Arc::new(HttpRequest::new("http:delete", reqwest::Method::DELETE, client)),
    ]
}

#[async_trait]
impl ActionHandler for HttpRequest {
    fn kind(&self) -> &'static str {
        self.kind
    }

    async fn execute(
        &self,
        ctx: &mut ActionContext,
        config: &Value,
        _interpreter: &Interpreter,
    ) -> Result<(), ActionError> {
        let cfg: HttpConfig = parse_config(ctx, config)?;
        let started = Instant::now();
        let http_error = |status: Option<u16>, reason: String, elapsed: Duration| {
            ActionError::Http {
                method: self.method.to_string(),
                url: cfg.url.clone(),
                status,
                elapsed_ms: elapsed.as_millis() as u64,
                reason,
            }
        };

        let mut request = self.client.request(self.method.clone(), &cfg.url);
        for (name, value) in &cfg.headers {
            request = request.header(name, value);
        }
        request = apply_auth(request, cfg.auth.as_ref(), ctx);
        if let Some(body) = &cfg.body {
            request = request.json(body);
        }
        if let Some(timeout_ms) = cfg.timeout_ms {
            request = request.timeout(Duration::from_millis(timeout_ms));
        }

        debug!(method = %self.method, url = %cfg.url, "issuing http request");
        let response = tokio::select! {
            response = request.send() => {
                response.map_err(|err| http_error(None, err.to_string(), started.elapsed()))?
            }
            () = ctx.cancellation.cancelled() => return Err(ActionError::Cancelled),
        };

        let status = response.status();
        let elapsed = started.elapsed();
        let text = response
            .text()
            .await
            .map_err(|err| http_error(Some(status.as_u16()), err.to_string(), elapsed))?;

        if !(status.is_success() || status.is_redirection()) {
            return Err(http_error(
                Some(status.as_u16()),
                "unexpected status".into(),
                elapsed,
            ));
        }

        if !cfg.after_hooks.is_empty()
            && let Ok(body) = serde_json::from_str::<Value>(&text)
        {
            for hook in &cfg.after_hooks {
                let extracted = quasar_expression::lookup(&body, &hook.path)
                    .map_err(ActionError::Template)?
                    .clone();
                ctx.vars
                    .set_runtime_path(&hook.save_as, extracted, hook.scope);
            }
        }
        Ok(())
    }
}

fn apply_auth(
    request: reqwest::RequestBuilder,
    auth: Option<&AuthConfig>,
    ctx: &ActionContext,
) -> reqwest::RequestBuilder {
    match auth {
        Some(AuthConfig::Bearer { token }) => {
            request.header("Authorization", format!("Bearer {token}"))
        }
        Some(AuthConfig::Basic { username, password }) => {
            let encoded = STANDARD.encode(format!("{username}:{password}"));
            request.header("Authorization", format!("Basic {encoded}"))
        }
        Some(AuthConfig::ApiKey { key, header }) => {
            request.header(header.as_deref().unwrap_or("X-API-Key"), key)
        }
        Some(AuthConfig::Custom { headers }) => {
            let mut request = request;
            for (name, value) in headers {
                request = request.header(name, value);
            }
            request
        }
        // No explicit auth: fall back to extracted credentials.
        None => {
            if let Some(Value::String(token)) = ctx.vars.get_runtime("access_token")
                && !token.is_empty()
            {
                return request.header("Authorization", format!("Bearer {token}"));
            }
            if let Some(Value::String(key)) = ctx.vars.get_runtime("api_key") {
                return request.header("X-API-Key", key);
            }
            request
        }
    }
}
