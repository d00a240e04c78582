// Authorization and token request validation.

use crate::config::OidcProviderOptions;
use crate::error::OAuthProviderError;
use crate::pkce::CodeChallengeMethod;
use crate::types::{AuthorizationRequest, CodeGrant, RegisteredClient, TokenRequest};

/// Validate an authorization request against the client registration and
/// provider options.
///
/// The redirect_uri check runs before anything else: when it fails the error
/// must be rendered, never redirected, since redirecting to an unregistered
/// URI is the open-redirect vector this check exists to close.
pub fn validate_authorization_request(
    request: &AuthorizationRequest,
    client: &RegisteredClient,
    options: &OidcProviderOptions,
) -> Result<Vec<String>, OAuthProviderError> {
    if !client.allows_redirect_uri(&request.redirect_uri) {
        return Err(OAuthProviderError::InvalidRedirectUri);
    }

    if client.disabled {
        return Err(OAuthProviderError::InvalidClient);
    }

    if request.response_type != "code" {
        return Err(OAuthProviderError::UnsupportedResponseType);
    }

    // Scopes: every requested scope must be one the provider grants.
    let scopes = requested_scopes(request, options);
    if scopes.iter().any(|s| !options.scopes.contains(s)) {
        return Err(OAuthProviderError::InvalidScope);
    }

    if options.require_pkce && request.code_challenge.is_none() {
        return Err(OAuthProviderError::InvalidCodeChallenge);
    }

    if let Some(method) = &request.code_challenge_method {
        match CodeChallengeMethod::parse(method) {
            Some(CodeChallengeMethod::S256) => {}
            Some(CodeChallengeMethod::Plain) if options.allow_plain_code_challenge_method => {}
            _ => return Err(OAuthProviderError::InvalidCodeChallenge),
        }
    }

    Ok(scopes)
}

/// The scopes a request asks for, falling back to the configured default.
pub fn requested_scopes(
    request: &AuthorizationRequest,
    options: &OidcProviderOptions,
) -> Vec<String> {
    request
        .scope
        .as_deref()
        .unwrap_or(&options.default_scope)
        .split_whitespace()
        .map(String::from)
        .collect()
}

/// Validate an authorization_code token request against the stored grant.
pub fn validate_code_redemption(
    request: &TokenRequest,
    grant: &CodeGrant,
    client_id: &str,
) -> Result<(), OAuthProviderError> {
    if grant.client_id != client_id {
        return Err(OAuthProviderError::InvalidGrant);
    }

    // redirect_uri must repeat the value bound at authorization time.
    match request.redirect_uri.as_deref() {
        Some(uri) if uri == grant.redirect_uri => {}
        Some(_) => return Err(OAuthProviderError::InvalidGrant),
        None => return Err(OAuthProviderError::InvalidRequest),
    }

    if let Some(challenge) = &grant.code_challenge {
        let verifier = request
            .code_verifier
            .as_deref()
            .ok_or(OAuthProviderError::InvalidGrant)?;
        let method = grant.code_challenge_method.as_deref().unwrap_or("S256");
        crate::pkce::verify_code_verifier(verifier, challenge, method)
            .map_err(|_| OAuthProviderError::InvalidGrant)?;
    }

    Ok(())
}

/// Validate that the scopes requested at consent time are a subset of the
/// scopes from the original authorization request. Narrowing is allowed,
/// widening is not.
pub fn validate_consent_scopes(
    requested: &[String],
    originally_requested: &[String],
) -> Result<(), OAuthProviderError> {
    if requested
        .iter()
        .all(|s| originally_requested.contains(s))
    {
        Ok(())
    } else {
        Err(OAuthProviderError::InvalidRequest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn client() -> RegisteredClient {
        RegisteredClient {
            id: "row".into(),
            client_id: "app".into(),
            client_secret: None,
            name: "App".into(),
            icon: None,
            redirect_uris: vec!["https://app.example.com/cb".into()],
            client_type: "web".into(),
            token_endpoint_auth_method: "client_secret_basic".into(),
            disabled: false,
            skip_consent: false,
            metadata: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn request() -> AuthorizationRequest {
        AuthorizationRequest {
            response_type: "code".into(),
            client_id: "app".into(),
            redirect_uri: "https://app.example.com/cb".into(),
            scope: Some("openid profile".into()),
            state: Some("xyz".into()),
            code_challenge: Some("challenge".into()),
            code_challenge_method: Some("S256".into()),
            prompt: None,
            nonce: None,
            max_age: None,
        }
    }

    #[test]
    fn valid_request_returns_scopes() {
        let scopes =
            validate_authorization_request(&request(), &client(), &OidcProviderOptions::default())
                .unwrap();
        assert_eq!(scopes, vec!["openid", "profile"]);
    }

    #[test]
    fn unregistered_redirect_uri_rejected() {
        let mut req = request();
        req.redirect_uri = "https://evil.example.com/cb".into();
        assert_eq!(
            validate_authorization_request(&req, &client(), &OidcProviderOptions::default())
                .unwrap_err(),
            OAuthProviderError::InvalidRedirectUri
        );
    }

    #[test]
    fn disabled_client_rejected() {
        let mut c = client();
        c.disabled = true;
        assert_eq!(
            validate_authorization_request(&request(), &c, &OidcProviderOptions::default())
                .unwrap_err(),
            OAuthProviderError::InvalidClient
        );
    }

    #[test]
    fn unknown_scope_rejected() {
        let mut req = request();
        req.scope = Some("openid admin:everything".into());
        assert_eq!(
            validate_authorization_request(&req, &client(), &OidcProviderOptions::default())
                .unwrap_err(),
            OAuthProviderError::InvalidScope
        );
    }

    #[test]
    fn pkce_required_when_configured() {
        let mut req = request();
        req.code_challenge = None;
        req.code_challenge_method = None;
        let options = OidcProviderOptions {
            require_pkce: true,
            ..OidcProviderOptions::default()
        };
        assert_eq!(
            validate_authorization_request(&req, &client(), &options).unwrap_err(),
            OAuthProviderError::InvalidCodeChallenge
        );
    }

    #[test]
    fn plain_method_rejected_unless_allowed() {
        let mut req = request();
        req.code_challenge_method = Some("plain".into());
        assert!(
            validate_authorization_request(&req, &client(), &OidcProviderOptions::default())
                .is_err()
        );

        let options = OidcProviderOptions {
            allow_plain_code_challenge_method: true,
            ..OidcProviderOptions::default()
        };
        assert!(validate_authorization_request(&req, &client(), &options).is_ok());
    }

    fn grant() -> CodeGrant {
        CodeGrant {
            client_id: "app".into(),
            redirect_uri: "https://app.example.com/cb".into(),
            user_id: "u1".into(),
            scopes: vec!["openid".into()],
            code_challenge: None,
            code_challenge_method: None,
            nonce: None,
            state: None,
            require_consent: None,
            prompt: None,
            auth_time: None,
        }
    }

    #[test]
    fn redemption_client_mismatch() {
        let req = TokenRequest {
            grant_type: "authorization_code".into(),
            redirect_uri: Some("https://app.example.com/cb".into()),
            ..Default::default()
        };
        assert_eq!(
            validate_code_redemption(&req, &grant(), "other-app").unwrap_err(),
            OAuthProviderError::InvalidGrant
        );
    }

    #[test]
    fn redemption_redirect_mismatch() {
        let req = TokenRequest {
            grant_type: "authorization_code".into(),
            redirect_uri: Some("https://app.example.com/other".into()),
            ..Default::default()
        };
        assert_eq!(
            validate_code_redemption(&req, &grant(), "app").unwrap_err(),
            OAuthProviderError::InvalidGrant
        );
    }

    #[test]
    fn redemption_pkce_enforced() {
        let mut g = grant();
        g.code_challenge = Some(crate::pkce::derive_code_challenge(
            "the-verifier",
            crate::pkce::CodeChallengeMethod::S256,
        ));
        g.code_challenge_method = Some("S256".into());

        let mut req = TokenRequest {
            grant_type: "authorization_code".into(),
            redirect_uri: Some("https://app.example.com/cb".into()),
            ..Default::default()
        };

        // Missing verifier
        assert!(validate_code_redemption(&req, &g, "app").is_err());

        // Wrong verifier
        req.code_verifier = Some("nope".into());
        assert!(validate_code_redemption(&req, &g, "app").is_err());

        // Correct verifier
        req.code_verifier = Some("the-verifier".into());
        assert!(validate_code_redemption(&req, &g, "app").is_ok());
    }

    #[test]
    fn consent_scope_narrowing_allowed_widening_rejected() {
        let original = vec!["openid".to_string(), "profile".to_string()];
        assert!(validate_consent_scopes(&["openid".to_string()], &original).is_ok());
        assert!(validate_consent_scopes(&original, &original).is_ok());
        assert_eq!(
            validate_consent_scopes(
                &["openid".to_string(), "email".to_string()],
                &original
            )
            .unwrap_err(),
            OAuthProviderError::InvalidRequest
        );
    }
}
