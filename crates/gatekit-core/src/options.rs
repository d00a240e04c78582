// AuthOptions — the top-level configuration surface.
//
// Read-only after boot: the init pass folds options + plugin contributions
// into an immutable AuthContext, and nothing mutates configuration at
// request time.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::db::secondary_storage::SecondaryStorage;

/// Top-level configuration for Gatekit.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthOptions {
    /// Secret key for cookie signing, token encryption, and the symmetric
    /// ID-token fallback. Minimum 32 characters in production.
    pub secret: String,

    /// Base URL of the auth server (e.g., "https://example.com").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Path prefix for all auth routes (default: "/api/auth").
    #[serde(default = "default_base_path")]
    pub base_path: String,

    /// App name for branding.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,

    /// Email/password credential verification.
    #[serde(default)]
    pub email_and_password: EmailAndPasswordOptions,

    /// Session lifecycle configuration.
    #[serde(default)]
    pub session: SessionOptions,

    /// Account linking and token storage configuration.
    #[serde(default)]
    pub account: AccountOptions,

    /// Multi-tenancy configuration.
    #[serde(default)]
    pub tenancy: TenancyOptions,

    /// Trusted origins for redirect validation. Supports exact origins.
    #[serde(default)]
    pub trusted_origins: Vec<String>,

    /// Advanced cookie knobs.
    #[serde(default)]
    pub advanced: AdvancedOptions,

    /// Plugin instances collected at init (declaration order defines
    /// override precedence).
    #[serde(skip)]
    pub plugins: Vec<Arc<dyn crate::plugin::AuthPlugin>>,

    /// Optional fast KV store for session caching.
    #[serde(skip)]
    pub secondary_storage: Option<Arc<dyn SecondaryStorage>>,

    /// Logger configuration.
    #[serde(default)]
    pub logger_config: LoggerOptions,
}

fn default_base_path() -> String {
    "/api/auth".to_string()
}

impl fmt::Debug for AuthOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthOptions")
            .field("secret", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("base_path", &self.base_path)
            .field("session", &self.session)
            .field("account", &self.account)
            .field("tenancy", &self.tenancy)
            .field("plugins", &self.plugins.len())
            .finish()
    }
}

impl Default for AuthOptions {
    fn default() -> Self {
        Self {
            secret: String::new(),
            base_url: None,
            base_path: default_base_path(),
            app_name: None,
            email_and_password: EmailAndPasswordOptions::default(),
            session: SessionOptions::default(),
            account: AccountOptions::default(),
            tenancy: TenancyOptions::default(),
            trusted_origins: Vec::new(),
            advanced: AdvancedOptions::default(),
            plugins: Vec::new(),
            secondary_storage: None,
            logger_config: LoggerOptions::default(),
        }
    }
}

impl AuthOptions {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            ..Default::default()
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn add_plugin(mut self, plugin: Arc<dyn crate::plugin::AuthPlugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn secondary_storage(mut self, storage: Arc<dyn SecondaryStorage>) -> Self {
        self.secondary_storage = Some(storage);
        self
    }

    pub fn enable_tenancy(mut self) -> Self {
        self.tenancy.enabled = true;
        self
    }
}

// ─── Email & Password ────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailAndPasswordOptions {
    /// Enable email/password credential verification (default: false).
    #[serde(default)]
    pub enabled: bool,
}

// ─── Session ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOptions {
    /// Session TTL in seconds (default: 604800 = 7 days).
    #[serde(default = "default_session_expires_in")]
    pub expires_in: u64,

    /// Rolling-renewal throttle in seconds (default: 86400 = 1 day). A
    /// session becomes due for renewal at `expiresAt - expiresIn + updateAge`.
    #[serde(default = "default_session_update_age")]
    pub update_age: u64,

    /// Fresh-session window in seconds for sensitive operations.
    #[serde(default = "default_session_fresh_age")]
    pub fresh_age: u64,

    /// Cookie cache configuration.
    #[serde(default)]
    pub cookie_cache: CookieCacheOptions,

    /// Also persist session rows in the primary database when secondary
    /// storage is configured.
    #[serde(default)]
    pub store_session_in_database: bool,

    /// Globally disable rolling renewal.
    #[serde(default)]
    pub disable_session_refresh: bool,
}

fn default_session_expires_in() -> u64 {
    604_800
}
fn default_session_update_age() -> u64 {
    86_400
}
fn default_session_fresh_age() -> u64 {
    86_400
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            expires_in: default_session_expires_in(),
            update_age: default_session_update_age(),
            fresh_age: default_session_fresh_age(),
            cookie_cache: CookieCacheOptions::default(),
            store_session_in_database: false,
            disable_session_refresh: false,
        }
    }
}

/// Cookie cache configuration.
///
/// The cache is a signed client-side snapshot of session+user data with its
/// own short TTL, independent from the session's expiry. Invalidation is
/// time-based only: mutations that bypass the cookie-refresh path (e.g. an
/// admin user update) stay invisible until the cache expires. Callers that
/// need fresh data pass `disableCookieCache` on the read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieCacheOptions {
    /// Enable the cookie cache (default: false).
    #[serde(default)]
    pub enabled: bool,

    /// Cache TTL in seconds (default: 300 = 5 minutes). This bounds the
    /// staleness window described above.
    #[serde(default = "default_cookie_cache_max_age")]
    pub max_age: u64,

    /// Encoding strategy for the cached payload.
    #[serde(default)]
    pub strategy: CookieCacheStrategy,

    /// Version string; a mismatch on read invalidates the cache.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

fn default_cookie_cache_max_age() -> u64 {
    300
}

impl Default for CookieCacheOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            max_age: default_cookie_cache_max_age(),
            strategy: CookieCacheStrategy::default(),
            version: None,
        }
    }
}

/// Encoding strategy for the cookie cache payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CookieCacheStrategy {
    /// base64url(JSON) + HMAC-SHA256 signature (most compact, default).
    #[default]
    Compact,
    /// HS256-signed JWT.
    Jwt,
    /// Symmetric encryption (XChaCha20-Poly1305).
    Jwe,
}

// ─── Account ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountOptions {
    /// Account linking configuration.
    #[serde(default)]
    pub account_linking: AccountLinkingOptions,

    /// Update stored provider tokens on each sign-in (default: true).
    #[serde(default = "default_true")]
    pub update_account_on_sign_in: bool,

    /// Encrypt stored provider tokens with the server secret (default: false).
    #[serde(default)]
    pub encrypt_oauth_tokens: bool,
}

fn default_true() -> bool {
    true
}

impl Default for AccountOptions {
    fn default() -> Self {
        Self {
            account_linking: AccountLinkingOptions::default(),
            update_account_on_sign_in: true,
            encrypt_oauth_tokens: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountLinkingOptions {
    /// Enable automatic account linking (default: true).
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Providers whose email claims are trusted for auto-linking to an
    /// existing user with a matching email.
    #[serde(default)]
    pub trusted_providers: Vec<String>,
}

impl Default for AccountLinkingOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            trusted_providers: Vec::new(),
        }
    }
}

// ─── Tenancy ─────────────────────────────────────────────────────

/// Multi-tenancy configuration. When enabled, every adapter call touching
/// sessions is scoped by the tenant identifier derived from the request; a
/// row belonging to a different tenant behaves as not-found.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenancyOptions {
    #[serde(default)]
    pub enabled: bool,

    /// Request header carrying the tenant identifier (default: "x-tenant-id").
    #[serde(default = "default_tenant_header")]
    pub header: String,
}

impl Default for TenancyOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            header: default_tenant_header(),
        }
    }
}

fn default_tenant_header() -> String {
    "x-tenant-id".to_string()
}

// ─── Advanced ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedOptions {
    /// Custom cookie name prefix (default: "gatekit").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookie_prefix: Option<String>,

    /// Cross-subdomain cookie configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cross_sub_domain_cookies: Option<CrossSubDomainCookieOptions>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossSubDomainCookieOptions {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

// ─── Logger ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggerOptions {
    #[serde(default)]
    pub disabled: bool,

    /// Log level: "error", "warn", "info", "debug".
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = AuthOptions::new("secret-0123456789-0123456789-0123");
        assert_eq!(options.base_path, "/api/auth");
        assert_eq!(options.session.expires_in, 604_800);
        assert_eq!(options.session.update_age, 86_400);
        assert_eq!(options.session.cookie_cache.max_age, 300);
        assert!(!options.session.cookie_cache.enabled);
        assert!(!options.tenancy.enabled);
        assert_eq!(options.tenancy.header, "x-tenant-id");
    }

    #[test]
    fn builder_methods() {
        let options = AuthOptions::new("s".repeat(32))
            .base_url("https://auth.example.com")
            .enable_tenancy();
        assert_eq!(options.base_url.as_deref(), Some("https://auth.example.com"));
        assert!(options.tenancy.enabled);
    }

    #[test]
    fn debug_redacts_secret() {
        let options = AuthOptions::new("super-secret-value-0123456789012");
        let dbg = format!("{options:?}");
        assert!(!dbg.contains("super-secret-value"));
        assert!(dbg.contains("[REDACTED]"));
    }
}
