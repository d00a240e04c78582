// Plugin contract: each plugin contributes typed capability records — schema
// tables, endpoint handlers, model hooks, rate-limit rules. Contributions are
// collected once at init into an immutable registry; there is no runtime
// patching.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::db::schema::{AuthTable, SchemaField};

// ─── Handler Types ───────────────────────────────────────────────

/// The request context passed to a plugin handler.
#[derive(Debug, Clone, Default)]
pub struct PluginHandlerRequest {
    /// Request body (JSON). Empty object for GET requests.
    pub body: Value,
    /// Query parameters as a JSON object.
    pub query: Value,
    pub headers: HashMap<String, String>,
    /// Session token extracted from cookie/Authorization header, if any.
    pub session_token: Option<String>,
    /// The authenticated `{ "session": ..., "user": ... }` pair when
    /// `require_auth` is set and resolution succeeded.
    pub session: Option<Value>,
    /// Tenant identifier derived from the request, when tenancy is enabled.
    pub tenant_id: Option<String>,
}

/// The response returned by a plugin handler.
#[derive(Debug, Clone)]
pub struct PluginHandlerResponse {
    pub status: u16,
    pub body: Value,
    pub headers: HashMap<String, String>,
    /// Redirect target; handlers in browser-facing flows answer with this
    /// instead of a body.
    pub redirect: Option<String>,
}

impl PluginHandlerResponse {
    pub fn ok(body: Value) -> Self {
        Self {
            status: 200,
            body,
            headers: HashMap::new(),
            redirect: None,
        }
    }

    pub fn created(body: Value) -> Self {
        Self {
            status: 201,
            body,
            headers: HashMap::new(),
            redirect: None,
        }
    }

    pub fn error(status: u16, code: &str, message: &str) -> Self {
        Self {
            status,
            body: serde_json::json!({
                "code": code,
                "message": message,
            }),
            headers: HashMap::new(),
            redirect: None,
        }
    }

    pub fn redirect_to(url: impl Into<String>) -> Self {
        Self {
            status: 302,
            body: Value::Null,
            headers: HashMap::new(),
            redirect: Some(url.into()),
        }
    }
}

/// Type-erased async plugin handler.
///
/// The context is `Arc<dyn Any>` (actually the main crate's `AuthContext`) to
/// avoid a circular dependency between this crate and the crate that defines
/// the context.
pub type PluginHandlerFn = Arc<
    dyn Fn(
            Arc<dyn std::any::Any + Send + Sync>,
            PluginHandlerRequest,
        ) -> Pin<Box<dyn Future<Output = PluginHandlerResponse> + Send>>
        + Send
        + Sync,
>;

// ─── Plugin Trait ────────────────────────────────────────────────

/// The plugin trait. Every extension implements this.
#[async_trait]
pub trait AuthPlugin: Send + Sync + fmt::Debug {
    /// Unique identifier (e.g., "oidc-provider", "jwt").
    fn id(&self) -> &str;

    fn name(&self) -> &str {
        self.id()
    }

    /// Called during context initialization, in declaration order.
    async fn init(&self, _ctx: &PluginInitContext<'_>) -> Result<(), crate::error::AuthError> {
        Ok(())
    }

    /// Database tables introduced by this plugin.
    fn schema(&self) -> Vec<AuthTable> {
        Vec::new()
    }

    /// Extra fields to add to existing tables: table name → field name → field.
    fn additional_fields(&self) -> HashMap<String, HashMap<String, SchemaField>> {
        HashMap::new()
    }

    /// Endpoints contributed by this plugin.
    fn endpoints(&self) -> Vec<PluginEndpoint> {
        Vec::new()
    }

    /// Model-level hooks (before/after create, update, delete).
    fn hooks(&self) -> Vec<PluginHook> {
        Vec::new()
    }

    /// Rate limit rules for plugin endpoints.
    fn rate_limit(&self) -> Vec<PluginRateLimit> {
        Vec::new()
    }

    /// Extra userinfo claims contributed for the OIDC provider's userinfo
    /// endpoint: claim name → value, computed from the user record and
    /// granted scopes.
    fn additional_userinfo_claims(
        &self,
        _user: &Value,
        _scopes: &[String],
    ) -> HashMap<String, Value> {
        HashMap::new()
    }
}

/// Context available during plugin initialization.
#[derive(Debug)]
pub struct PluginInitContext<'a> {
    pub options: &'a crate::options::AuthOptions,
}

/// An endpoint contributed by a plugin.
pub struct PluginEndpoint {
    pub path: String,
    pub method: HttpMethod,
    pub require_auth: bool,
    pub handler: Option<PluginHandlerFn>,
}

impl Clone for PluginEndpoint {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            method: self.method,
            require_auth: self.require_auth,
            handler: self.handler.clone(),
        }
    }
}

impl fmt::Debug for PluginEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginEndpoint")
            .field("path", &self.path)
            .field("method", &self.method)
            .field("require_auth", &self.require_auth)
            .field("handler", &self.handler.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl PluginEndpoint {
    pub fn with_handler(
        path: impl Into<String>,
        method: HttpMethod,
        require_auth: bool,
        handler: PluginHandlerFn,
    ) -> Self {
        Self {
            path: path.into(),
            method,
            require_auth,
            handler: Some(handler),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

/// Model-level hook declaration.
#[derive(Debug, Clone)]
pub struct PluginHook {
    pub model: String,
    pub timing: HookTiming,
    pub operation: HookOperation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookTiming {
    Before,
    After,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOperation {
    Create,
    Update,
    Delete,
}

/// Rate limit rule for a path prefix.
#[derive(Debug, Clone)]
pub struct PluginRateLimit {
    pub path: String,
    pub window: u64,
    pub max: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_constructors() {
        let ok = PluginHandlerResponse::ok(serde_json::json!({"a": 1}));
        assert_eq!(ok.status, 200);

        let err = PluginHandlerResponse::error(400, "INVALID_REQUEST", "bad");
        assert_eq!(err.status, 400);
        assert_eq!(err.body["code"], "INVALID_REQUEST");

        let redirect = PluginHandlerResponse::redirect_to("/login");
        assert_eq!(redirect.status, 302);
        assert_eq!(redirect.redirect.as_deref(), Some("/login"));
    }
}
