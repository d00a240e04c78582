// Provider registration: issuer validation, discovery hydration, and the
// uniqueness rule callers enforce against their store.

use chrono::Utc;

use crate::discovery::discover_oidc_config;
use crate::error::SsoError;
use crate::types::{OidcConfig, ProviderRegistration};

/// Inputs for registering an identity provider.
#[derive(Debug, Clone)]
pub struct RegisterProviderRequest {
    pub provider_id: String,
    pub issuer: String,
    pub domain: String,
    pub oidc_config: OidcConfig,
    pub organization_id: Option<String>,
    pub user_id: String,
}

/// Validate an issuer URL: absolute, http(s), no fragment.
pub fn validate_issuer(issuer: &str) -> Result<url::Url, SsoError> {
    let parsed =
        url::Url::parse(issuer).map_err(|e| SsoError::InvalidIssuer(format!("{issuer}: {e}")))?;

    if parsed.scheme() != "https" && parsed.scheme() != "http" {
        return Err(SsoError::InvalidIssuer(format!(
            "unsupported scheme '{}'",
            parsed.scheme()
        )));
    }
    if parsed.fragment().is_some() {
        return Err(SsoError::InvalidIssuer(
            "issuer must not carry a fragment".into(),
        ));
    }
    Ok(parsed)
}

/// Build a registration row, hydrating missing endpoints via discovery.
///
/// `already_exists` is the caller's uniqueness probe (a store lookup on
/// provider_id); a hit is a conflict, not an overwrite.
pub async fn build_registration(
    request: RegisterProviderRequest,
    already_exists: bool,
) -> Result<ProviderRegistration, SsoError> {
    validate_issuer(&request.issuer)?;

    if already_exists {
        return Err(SsoError::DuplicateProvider(request.provider_id));
    }

    let mut oidc_config = request.oidc_config;
    if !oidc_config.is_hydrated() {
        let discovered = discover_oidc_config(&request.issuer).await?;
        oidc_config.authorization_endpoint = oidc_config
            .authorization_endpoint
            .or(Some(discovered.authorization_endpoint));
        oidc_config.token_endpoint = oidc_config.token_endpoint.or(Some(discovered.token_endpoint));
        oidc_config.jwks_endpoint = oidc_config.jwks_endpoint.or(Some(discovered.jwks_uri));
        oidc_config.userinfo_endpoint =
            oidc_config.userinfo_endpoint.or(discovered.userinfo_endpoint);
    }

    let now = Utc::now();
    Ok(ProviderRegistration {
        id: nanoid::nanoid!(),
        provider_id: request.provider_id,
        issuer: request.issuer,
        domain: request.domain,
        oidc_config,
        organization_id: request.organization_id,
        user_id: request.user_id,
        created_at: now,
        updated_at: now,
    })
}

/// Resolve the endpoint set for a registration, falling back to runtime
/// discovery for legacy rows stored before hydration existed.
pub async fn resolve_endpoints(
    registration: &ProviderRegistration,
) -> Result<OidcConfig, SsoError> {
    if registration.oidc_config.is_hydrated() {
        return Ok(registration.oidc_config.clone());
    }

    let discovered = discover_oidc_config(&registration.issuer).await?;
    let mut config = registration.oidc_config.clone();
    config.authorization_endpoint = config
        .authorization_endpoint
        .or(Some(discovered.authorization_endpoint));
    config.token_endpoint = config.token_endpoint.or(Some(discovered.token_endpoint));
    config.jwks_endpoint = config.jwks_endpoint.or(Some(discovered.jwks_uri));
    config.userinfo_endpoint = config.userinfo_endpoint.or(discovered.userinfo_endpoint);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hydrated_config() -> OidcConfig {
        OidcConfig {
            client_id: "client".into(),
            client_secret: Some("secret".into()),
            authorization_endpoint: Some("https://idp.test/authorize".into()),
            token_endpoint: Some("https://idp.test/token".into()),
            jwks_endpoint: Some("https://idp.test/jwks".into()),
            userinfo_endpoint: None,
            scopes: vec!["openid".into()],
            pkce: true,
        }
    }

    #[test]
    fn issuer_validation() {
        assert!(validate_issuer("https://idp.example.com").is_ok());
        assert!(validate_issuer("http://localhost:8080").is_ok());
        assert!(validate_issuer("ftp://idp.example.com").is_err());
        assert!(validate_issuer("not a url").is_err());
        assert!(validate_issuer("https://idp.example.com/#frag").is_err());
    }

    #[tokio::test]
    async fn duplicate_provider_conflicts() {
        let err = build_registration(
            RegisterProviderRequest {
                provider_id: "acme".into(),
                issuer: "https://idp.acme.test".into(),
                domain: "acme.test".into(),
                oidc_config: hydrated_config(),
                organization_id: None,
                user_id: "u1".into(),
            },
            true,
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), 409);
        assert_eq!(err.code(), "provider_already_registered");
    }

    #[tokio::test]
    async fn hydrated_config_skips_discovery() {
        // Issuer is unreachable; registration must still succeed because the
        // endpoints were supplied.
        let registration = build_registration(
            RegisterProviderRequest {
                provider_id: "acme".into(),
                issuer: "http://127.0.0.1:1".into(),
                domain: "acme.test".into(),
                oidc_config: hydrated_config(),
                organization_id: Some("org-1".into()),
                user_id: "u1".into(),
            },
            false,
        )
        .await
        .unwrap();
        assert_eq!(registration.provider_id, "acme");
        assert!(registration.oidc_config.is_hydrated());
    }

    #[tokio::test]
    async fn unhydrated_config_requires_reachable_issuer() {
        let mut config = hydrated_config();
        config.jwks_endpoint = None;
        let err = build_registration(
            RegisterProviderRequest {
                provider_id: "acme".into(),
                issuer: "http://127.0.0.1:1".into(),
                domain: "acme.test".into(),
                oidc_config: config,
                organization_id: None,
                user_id: "u1".into(),
            },
            false,
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), 502);
    }
}
