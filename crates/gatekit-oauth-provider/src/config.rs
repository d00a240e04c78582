// OpenID Provider configuration.

use serde::{Deserialize, Serialize};

use crate::types::RegisteredClient;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OidcProviderOptions {
    /// Login page RPs are bounced to when no session exists.
    #[serde(default = "default_login_page")]
    pub login_page: String,

    /// Consent page shown before first code issuance.
    #[serde(default = "default_consent_page")]
    pub consent_page: String,

    /// Authorization code TTL in seconds (default: 600).
    #[serde(default = "default_code_expires_in")]
    pub code_expires_in: i64,

    /// Access token TTL in seconds (default: 3600).
    #[serde(default = "default_access_token_expires_in")]
    pub access_token_expires_in: i64,

    /// Refresh token TTL in seconds (default: 604800 = 7 days).
    #[serde(default = "default_refresh_token_expires_in")]
    pub refresh_token_expires_in: i64,

    /// Scope applied when the request carries none.
    #[serde(default = "default_scope")]
    pub default_scope: String,

    /// Scopes this provider will grant.
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,

    /// Require PKCE on every authorization request.
    #[serde(default)]
    pub require_pkce: bool,

    /// Accept the "plain" code_challenge_method besides S256.
    #[serde(default)]
    pub allow_plain_code_challenge_method: bool,

    /// Allow unauthenticated dynamic client registration.
    #[serde(default)]
    pub allow_dynamic_client_registration: bool,

    /// Statically configured clients; looked up before the database.
    #[serde(default)]
    pub trusted_clients: Vec<RegisteredClient>,
}

fn default_login_page() -> String {
    "/login".to_string()
}
fn default_consent_page() -> String {
    "/consent".to_string()
}
fn default_code_expires_in() -> i64 {
    600
}
fn default_access_token_expires_in() -> i64 {
    3600
}
fn default_refresh_token_expires_in() -> i64 {
    604_800
}
fn default_scope() -> String {
    "openid".to_string()
}
fn default_scopes() -> Vec<String> {
    vec![
        "openid".into(),
        "profile".into(),
        "email".into(),
        "offline_access".into(),
    ]
}

impl Default for OidcProviderOptions {
    fn default() -> Self {
        Self {
            login_page: default_login_page(),
            consent_page: default_consent_page(),
            code_expires_in: default_code_expires_in(),
            access_token_expires_in: default_access_token_expires_in(),
            refresh_token_expires_in: default_refresh_token_expires_in(),
            default_scope: default_scope(),
            scopes: default_scopes(),
            require_pkce: false,
            allow_plain_code_challenge_method: false,
            allow_dynamic_client_registration: false,
            trusted_clients: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let opts = OidcProviderOptions::default();
        assert_eq!(opts.code_expires_in, 600);
        assert_eq!(opts.access_token_expires_in, 3600);
        assert!(opts.scopes.contains(&"openid".to_string()));
        assert!(!opts.require_pkce);
    }
}
