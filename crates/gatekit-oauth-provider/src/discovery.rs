// OpenID Provider discovery metadata (/.well-known/openid-configuration).

use serde::{Deserialize, Serialize};

use crate::config::OidcProviderOptions;

/// OpenID Provider Metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OidcMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
    pub jwks_uri: String,
    pub registration_endpoint: String,
    pub scopes_supported: Vec<String>,
    pub response_types_supported: Vec<String>,
    pub response_modes_supported: Vec<String>,
    pub grant_types_supported: Vec<String>,
    pub subject_types_supported: Vec<String>,
    pub id_token_signing_alg_values_supported: Vec<String>,
    pub token_endpoint_auth_methods_supported: Vec<String>,
    pub code_challenge_methods_supported: Vec<String>,
    pub claims_supported: Vec<String>,
}

/// Build the discovery document for a given base URL.
///
/// `asymmetric_signing` reflects whether a signing-key provider is
/// registered; without one, ID tokens fall back to HMAC and only HS256 is
/// advertised.
pub fn build_oidc_metadata(
    base_url: &str,
    options: &OidcProviderOptions,
    asymmetric_signing: bool,
) -> OidcMetadata {
    let base = base_url.trim_end_matches('/');

    let mut code_challenge_methods = vec!["S256".to_string()];
    if options.allow_plain_code_challenge_method {
        code_challenge_methods.push("plain".to_string());
    }

    let signing_algs = if asymmetric_signing {
        vec!["EdDSA".to_string()]
    } else {
        vec!["HS256".to_string()]
    };

    OidcMetadata {
        issuer: base.to_string(),
        authorization_endpoint: format!("{base}/oauth2/authorize"),
        token_endpoint: format!("{base}/oauth2/token"),
        userinfo_endpoint: format!("{base}/oauth2/userinfo"),
        jwks_uri: format!("{base}/jwks"),
        registration_endpoint: format!("{base}/oauth2/register"),
        scopes_supported: options.scopes.clone(),
        response_types_supported: vec!["code".into()],
        response_modes_supported: vec!["query".into()],
        grant_types_supported: vec!["authorization_code".into(), "refresh_token".into()],
        subject_types_supported: vec!["public".into()],
        id_token_signing_alg_values_supported: signing_algs,
        token_endpoint_auth_methods_supported: vec![
            "client_secret_basic".into(),
            "client_secret_post".into(),
            "none".into(),
        ],
        code_challenge_methods_supported: code_challenge_methods,
        claims_supported: vec![
            "sub".into(),
            "iss".into(),
            "aud".into(),
            "exp".into(),
            "iat".into(),
            "auth_time".into(),
            "nonce".into(),
            "email".into(),
            "email_verified".into(),
            "name".into(),
            "picture".into(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_derived_from_base_url() {
        let meta = build_oidc_metadata(
            "https://auth.example.com/api/auth/",
            &OidcProviderOptions::default(),
            false,
        );
        assert_eq!(meta.issuer, "https://auth.example.com/api/auth");
        assert_eq!(
            meta.authorization_endpoint,
            "https://auth.example.com/api/auth/oauth2/authorize"
        );
        assert_eq!(meta.jwks_uri, "https://auth.example.com/api/auth/jwks");
    }

    #[test]
    fn signing_alg_reflects_key_provider() {
        let opts = OidcProviderOptions::default();
        let symmetric = build_oidc_metadata("https://a.test", &opts, false);
        assert_eq!(symmetric.id_token_signing_alg_values_supported, vec!["HS256"]);

        let asymmetric = build_oidc_metadata("https://a.test", &opts, true);
        assert_eq!(asymmetric.id_token_signing_alg_values_supported, vec!["EdDSA"]);
    }

    #[test]
    fn plain_pkce_advertised_only_when_allowed() {
        let meta = build_oidc_metadata(
            "https://a.test",
            &OidcProviderOptions::default(),
            false,
        );
        assert_eq!(meta.code_challenge_methods_supported, vec!["S256"]);
    }
}
