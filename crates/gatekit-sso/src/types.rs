// SSO provider registration types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered third-party identity provider.
///
/// `provider_id` is globally unique. `oidc_config` must, after discovery
/// hydration, carry at least the authorization, token, and jwks endpoints;
/// legacy rows missing them fall back to runtime discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderRegistration {
    pub id: String,
    pub provider_id: String,
    pub issuer: String,
    /// Email domain routed to this provider at sign-in.
    pub domain: String,
    pub oidc_config: OidcConfig,
    /// Restrict the registration to one organization.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    /// Owner of the registration.
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// OIDC client configuration against the registered IdP.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OidcConfig {
    pub client_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwks_endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub userinfo_endpoint: Option<String>,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub pkce: bool,
}

fn default_scopes() -> Vec<String> {
    vec!["openid".into(), "profile".into(), "email".into()]
}

impl OidcConfig {
    /// Whether the endpoint set is fully hydrated.
    pub fn is_hydrated(&self) -> bool {
        self.authorization_endpoint.is_some()
            && self.token_endpoint.is_some()
            && self.jwks_endpoint.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hydration_check() {
        let mut config = OidcConfig {
            client_id: "c".into(),
            client_secret: None,
            authorization_endpoint: Some("https://idp.test/authorize".into()),
            token_endpoint: Some("https://idp.test/token".into()),
            jwks_endpoint: None,
            userinfo_endpoint: None,
            scopes: default_scopes(),
            pkce: true,
        };
        assert!(!config.is_hydrated());
        config.jwks_endpoint = Some("https://idp.test/jwks".into());
        assert!(config.is_hydrated());
    }

    #[test]
    fn wire_shape() {
        let registration = ProviderRegistration {
            id: "row-1".into(),
            provider_id: "acme-idp".into(),
            issuer: "https://idp.acme.test".into(),
            domain: "acme.test".into(),
            oidc_config: OidcConfig {
                client_id: "client".into(),
                client_secret: Some("secret".into()),
                authorization_endpoint: None,
                token_endpoint: None,
                jwks_endpoint: None,
                userinfo_endpoint: None,
                scopes: default_scopes(),
                pkce: true,
            },
            organization_id: None,
            user_id: "u1".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&registration).unwrap();
        assert_eq!(json["providerId"], "acme-idp");
        assert_eq!(json["oidcConfig"]["clientId"], "client");
        assert!(json.get("organizationId").is_none());
    }
}
