// AuthContext — the fully-initialized configuration every handler receives.
// Built once at startup from AuthOptions + an adapter; read-only afterwards,
// shared as Arc<AuthContext> across requests.

use std::collections::HashMap;
use std::sync::Arc;

use gatekit_core::db::schema::{core_schema, AuthSchema};
use gatekit_core::hooks::AsyncHookRegistry;
use gatekit_core::logger::AuthLogger;
use gatekit_core::options::{AuthOptions, CookieCacheStrategy};

use crate::cookies::AuthCookies;
use crate::internal_adapter::InternalAdapter;
use crate::plugin_runtime::PluginRegistry;
use gatekit_oauth2::OAuthProvider;

/// Resolved session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub expires_in: u64,
    pub update_age: u64,
    pub fresh_age: u64,
    pub cookie_cache_enabled: bool,
    pub cookie_cache_max_age: u64,
    pub cookie_cache_strategy: CookieCacheStrategy,
    pub cookie_cache_version: Option<String>,
    pub disable_session_refresh: bool,
}

/// Resolved tenancy configuration.
#[derive(Debug, Clone)]
pub struct TenancyConfig {
    pub enabled: bool,
    pub header: String,
}

/// The shared request-processing context.
pub struct AuthContext {
    pub options: AuthOptions,
    pub app_name: String,
    pub secret: String,
    pub base_url: Option<String>,
    pub base_path: String,
    pub auth_cookies: AuthCookies,
    pub trusted_origins: Vec<String>,
    pub session_config: SessionConfig,
    pub tenancy: TenancyConfig,
    pub adapter: Arc<dyn InternalAdapter>,
    /// OAuth providers this instance can sign in against, by provider id.
    pub oauth_providers: HashMap<String, Arc<dyn OAuthProvider>>,
    pub plugin_registry: PluginRegistry,
    /// Merged core + plugin schema; drives output filtering.
    pub schema: AuthSchema,
    pub logger: AuthLogger,
    pub async_hooks: AsyncHookRegistry,
}

impl std::fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthContext")
            .field("app_name", &self.app_name)
            .field("secret", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("base_path", &self.base_path)
            .field("session_config", &self.session_config)
            .field("tenancy", &self.tenancy)
            .field("oauth_providers", &self.oauth_providers.keys().collect::<Vec<_>>())
            .field("plugin_registry", &self.plugin_registry)
            .finish()
    }
}

/// Builder for the context; collects the pieces init assembles.
pub struct AuthContextBuilder {
    options: AuthOptions,
    raw_adapter: Arc<dyn gatekit_core::db::adapter::Adapter>,
    oauth_providers: HashMap<String, Arc<dyn OAuthProvider>>,
    hooks: Vec<(
        gatekit_core::hooks::HookEvent,
        Arc<dyn gatekit_core::hooks::AsyncHook>,
    )>,
}

impl AuthContextBuilder {
    pub fn new(
        options: AuthOptions,
        adapter: Arc<dyn gatekit_core::db::adapter::Adapter>,
    ) -> Self {
        Self {
            options,
            raw_adapter: adapter,
            oauth_providers: HashMap::new(),
            hooks: Vec::new(),
        }
    }

    pub fn oauth_provider(mut self, provider: Arc<dyn OAuthProvider>) -> Self {
        self.oauth_providers.insert(provider.id().to_string(), provider);
        self
    }

    /// Register a lifecycle hook.
    pub fn hook(
        mut self,
        event: gatekit_core::hooks::HookEvent,
        hook: Arc<dyn gatekit_core::hooks::AsyncHook>,
    ) -> Self {
        self.hooks.push((event, hook));
        self
    }

    /// Fold options + plugin contributions into the immutable context.
    pub fn build(self) -> Arc<AuthContext> {
        let options = self.options;
        let secret = options.secret.clone();
        let base_url = options.base_url.clone();
        let base_path = options.base_path.clone();
        let app_name = options
            .app_name
            .clone()
            .unwrap_or_else(|| "Gatekit".to_string());
        let auth_cookies = crate::cookies::get_cookies(&options);
        let logger = AuthLogger::from_options(&options.logger_config);

        let mut trusted_origins = options.trusted_origins.clone();
        if let Some(url) = &base_url {
            if let Ok(parsed) = url::Url::parse(url) {
                let origin = parsed.origin().ascii_serialization();
                if !trusted_origins.contains(&origin) {
                    trusted_origins.push(origin);
                }
            }
        }

        let session_config = SessionConfig {
            expires_in: options.session.expires_in,
            update_age: options.session.update_age,
            fresh_age: options.session.fresh_age,
            cookie_cache_enabled: options.session.cookie_cache.enabled,
            cookie_cache_max_age: options.session.cookie_cache.max_age,
            cookie_cache_strategy: options.session.cookie_cache.strategy,
            cookie_cache_version: options.session.cookie_cache.version.clone(),
            disable_session_refresh: options.session.disable_session_refresh,
        };

        let tenancy = TenancyConfig {
            enabled: options.tenancy.enabled,
            header: options.tenancy.header.clone(),
        };

        // Plugin fold: declaration order defines precedence.
        let plugin_registry = PluginRegistry::from_plugins(options.plugins.clone());
        let schema = plugin_registry.merge_schema(core_schema());

        // Wrap the raw adapter, wiring the secondary store when configured.
        let adapter: Arc<dyn InternalAdapter> = match options.secondary_storage.clone() {
            Some(secondary) => Arc::new(crate::internal_adapter::StoreAdapter::with_secondary_storage(
                self.raw_adapter,
                secondary,
                options.session.store_session_in_database,
            )),
            None => Arc::new(crate::internal_adapter::StoreAdapter::new(self.raw_adapter)),
        };

        let mut async_hooks = AsyncHookRegistry::new();
        for (event, hook) in self.hooks {
            async_hooks.register(event, hook);
        }

        Arc::new(AuthContext {
            options,
            app_name,
            secret,
            base_url,
            base_path,
            auth_cookies,
            trusted_origins,
            session_config,
            tenancy,
            adapter,
            oauth_providers: self.oauth_providers,
            plugin_registry,
            schema,
            logger,
            async_hooks,
        })
    }
}

impl AuthContext {
    /// Whether a URL belongs to a trusted origin. Relative paths are always
    /// trusted when `allow_relative` is set.
    pub fn is_trusted_origin(&self, url: &str, allow_relative: bool) -> bool {
        if url.starts_with('/') && !url.starts_with("//") {
            return allow_relative;
        }
        match url::Url::parse(url) {
            Ok(parsed) => {
                let origin = parsed.origin().ascii_serialization();
                self.trusted_origins.iter().any(|o| *o == origin)
            }
            Err(_) => false,
        }
    }

    pub fn has_plugin(&self, plugin_id: &str) -> bool {
        self.plugin_registry.has_plugin(plugin_id)
    }

    /// The tenant id for a request, read from the configured header when
    /// tenancy is enabled.
    pub fn tenant_from_headers(&self, headers: &HashMap<String, String>) -> Option<String> {
        if !self.tenancy.enabled {
            return None;
        }
        headers.get(&self.tenancy.header).cloned()
    }

    /// The cookie cache config derived from session options.
    pub fn cookie_cache_config(&self) -> crate::cookies::CookieCacheConfig {
        crate::cookies::CookieCacheConfig {
            strategy: self.session_config.cookie_cache_strategy,
            version: self.session_config.cookie_cache_version.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatekit_memory::MemoryAdapter;

    fn test_context(options: AuthOptions) -> Arc<AuthContext> {
        AuthContextBuilder::new(options, Arc::new(MemoryAdapter::new())).build()
    }

    #[test]
    fn defaults_applied() {
        let ctx = test_context(AuthOptions::new("s".repeat(32)));
        assert_eq!(ctx.base_path, "/api/auth");
        assert_eq!(ctx.app_name, "Gatekit");
        assert!(!ctx.tenancy.enabled);
    }

    #[test]
    fn base_url_becomes_trusted_origin() {
        let mut options = AuthOptions::new("s".repeat(32));
        options.base_url = Some("https://example.com".into());
        options.trusted_origins.push("https://app.example.com".into());
        let ctx = test_context(options);

        assert!(ctx.is_trusted_origin("https://example.com/api", false));
        assert!(ctx.is_trusted_origin("https://app.example.com/cb", false));
        assert!(!ctx.is_trusted_origin("https://evil.example.net/cb", false));
    }

    #[test]
    fn relative_urls_honor_flag() {
        let ctx = test_context(AuthOptions::new("s".repeat(32)));
        assert!(ctx.is_trusted_origin("/dashboard", true));
        assert!(!ctx.is_trusted_origin("/dashboard", false));
        // Protocol-relative URLs are not relative paths.
        assert!(!ctx.is_trusted_origin("//evil.example.net", true));
    }

    #[test]
    fn tenant_header_lookup() {
        let mut options = AuthOptions::new("s".repeat(32));
        options.tenancy.enabled = true;
        let ctx = test_context(options);

        let mut headers = HashMap::new();
        headers.insert("x-tenant-id".to_string(), "acme".to_string());
        assert_eq!(ctx.tenant_from_headers(&headers).as_deref(), Some("acme"));

        let disabled = test_context(AuthOptions::new("s".repeat(32)));
        assert_eq!(disabled.tenant_from_headers(&headers), None);
    }
}
