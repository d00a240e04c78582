// The OAuthProvider trait and the generic endpoint-driven implementation.
//
// A provider is configured with its three endpoints plus a profile mapping;
// the generic implementation covers any standards-following IdP. Custom
// providers implement the trait directly when they need bespoke behavior
// (non-standard userinfo shapes, ID-token-only profiles, etc.).

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::authorization_url::{create_authorization_url, AuthorizationUrlParams};
use crate::code_exchange::{exchange_authorization_code, CodeExchangeParams, UPSTREAM_TIMEOUT};
use crate::error::UpstreamError;
use crate::refresh::{refresh_access_token, RefreshTokenParams};
use crate::tokens::{OAuth2Tokens, OAuth2UserInfo};

/// Client authentication method at the token endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthenticationMethod {
    /// client_secret_basic — credentials in the Authorization header.
    Basic,
    /// client_secret_post — credentials in the form body (default).
    #[default]
    Post,
    /// Public client, no secret.
    None,
}

/// Per-provider configuration supplied by the operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderOptions {
    pub client_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    /// Requested scopes (merged with the provider's defaults).
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Custom redirect URI, overriding the auto-generated callback route.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mode: Option<String>,
    /// Require an explicit requestSignUp for first-time users.
    #[serde(default)]
    pub disable_implicit_sign_up: bool,
    /// Disable sign-up entirely for this provider.
    #[serde(default)]
    pub disable_sign_up: bool,
    /// Refresh stored profile fields on every sign-in.
    #[serde(default)]
    pub override_user_info: bool,
}

impl ProviderOptions {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            scopes: Vec::new(),
            redirect_uri: None,
            prompt: None,
            response_mode: None,
            disable_implicit_sign_up: false,
            disable_sign_up: false,
            override_user_info: false,
        }
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    pub fn with_scopes(mut self, scopes: &[&str]) -> Self {
        self.scopes = scopes.iter().map(|s| s.to_string()).collect();
        self
    }
}

/// JSON paths for extracting user fields from the provider's profile
/// response. Paths may be nested ("data.user.id").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileMapping {
    pub id: String,
    pub name: String,
    pub email: String,
    pub image: String,
    pub email_verified: String,
    #[serde(default)]
    pub email_verified_default: bool,
}

impl Default for ProfileMapping {
    fn default() -> Self {
        // OIDC-standard claim names.
        Self {
            id: "sub".into(),
            name: "name".into(),
            email: "email".into(),
            image: "picture".into(),
            email_verified: "email_verified".into(),
            email_verified_default: false,
        }
    }
}

/// Endpoint configuration for a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub id: String,
    pub name: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
    #[serde(default)]
    pub default_scopes: Vec<String>,
    #[serde(default)]
    pub auth_method: AuthenticationMethod,
    #[serde(default)]
    pub profile_mapping: ProfileMapping,
    /// Provider-specific extra authorization query parameters.
    #[serde(default)]
    pub additional_auth_params: HashMap<String, String>,
}

/// Inputs for building the authorization URL.
#[derive(Debug, Clone)]
pub struct AuthorizationUrlData {
    pub state: String,
    pub code_verifier: Option<String>,
    pub scopes: Option<Vec<String>>,
    pub redirect_uri: String,
    pub login_hint: Option<String>,
}

/// Inputs for redeeming the callback code.
#[derive(Debug, Clone)]
pub struct CodeValidationData {
    pub code: String,
    pub redirect_uri: String,
    pub code_verifier: Option<String>,
}

/// The provider trait the callback flow drives.
#[async_trait]
pub trait OAuthProvider: Send + Sync + std::fmt::Debug {
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    fn options(&self) -> &ProviderOptions;

    /// Scopes to request when the caller passes none.
    fn default_scopes(&self) -> Vec<String>;

    /// Build the authorization URL for this provider.
    fn create_authorization_url(
        &self,
        data: &AuthorizationUrlData,
    ) -> Result<url::Url, url::ParseError>;

    /// Exchange the callback code for tokens.
    async fn validate_authorization_code(
        &self,
        data: &CodeValidationData,
    ) -> Result<OAuth2Tokens, UpstreamError>;

    /// Fetch and normalize the user profile.
    async fn get_user_info(&self, tokens: &OAuth2Tokens)
        -> Result<OAuth2UserInfo, UpstreamError>;

    /// Refresh an access token.
    async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<OAuth2Tokens, UpstreamError>;

    fn disable_implicit_sign_up(&self) -> bool {
        self.options().disable_implicit_sign_up
    }

    fn disable_sign_up(&self) -> bool {
        self.options().disable_sign_up
    }
}

/// Generic provider driven entirely by `ProviderConfig`.
#[derive(Debug, Clone)]
pub struct GenericOAuthProvider {
    pub config: ProviderConfig,
    pub options: ProviderOptions,
}

impl GenericOAuthProvider {
    pub fn new(config: ProviderConfig, options: ProviderOptions) -> Self {
        Self { config, options }
    }

    /// Extract a string at a nested JSON path like "data.user.id".
    fn extract_field(data: &serde_json::Value, path: &str) -> Option<String> {
        let mut current = data;
        for part in path.split('.') {
            current = current.get(part)?;
        }
        match current {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    fn extract_bool(data: &serde_json::Value, path: &str, default: bool) -> bool {
        let mut current = data;
        for part in path.split('.') {
            match current.get(part) {
                Some(v) => current = v,
                None => return default,
            }
        }
        match current {
            serde_json::Value::Bool(b) => *b,
            serde_json::Value::String(s) => s == "true",
            _ => default,
        }
    }
}

#[async_trait]
impl OAuthProvider for GenericOAuthProvider {
    fn id(&self) -> &str {
        &self.config.id
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    fn options(&self) -> &ProviderOptions {
        &self.options
    }

    fn default_scopes(&self) -> Vec<String> {
        if !self.options.scopes.is_empty() {
            return self.options.scopes.clone();
        }
        self.config.default_scopes.clone()
    }

    fn create_authorization_url(
        &self,
        data: &AuthorizationUrlData,
    ) -> Result<url::Url, url::ParseError> {
        let redirect_uri = self
            .options
            .redirect_uri
            .clone()
            .unwrap_or_else(|| data.redirect_uri.clone());

        create_authorization_url(AuthorizationUrlParams {
            authorization_endpoint: self.config.authorization_endpoint.clone(),
            client_id: self.options.client_id.clone(),
            redirect_uri,
            state: data.state.clone(),
            code_verifier: data.code_verifier.clone(),
            scopes: data.scopes.clone().unwrap_or_else(|| self.default_scopes()),
            response_type: None,
            prompt: self.options.prompt.clone(),
            login_hint: data.login_hint.clone(),
            response_mode: self.options.response_mode.clone(),
            scope_joiner: None,
            additional_params: self.config.additional_auth_params.clone(),
        })
    }

    async fn validate_authorization_code(
        &self,
        data: &CodeValidationData,
    ) -> Result<OAuth2Tokens, UpstreamError> {
        exchange_authorization_code(CodeExchangeParams {
            code: data.code.clone(),
            redirect_uri: data.redirect_uri.clone(),
            token_endpoint: self.config.token_endpoint.clone(),
            client_id: self.options.client_id.clone(),
            client_secret: self.options.client_secret.clone(),
            code_verifier: data.code_verifier.clone(),
            authentication: self.config.auth_method,
        })
        .await
    }

    async fn get_user_info(
        &self,
        tokens: &OAuth2Tokens,
    ) -> Result<OAuth2UserInfo, UpstreamError> {
        let access_token = tokens.access_token.as_deref().unwrap_or_default();

        let response = reqwest::Client::new()
            .get(&self.config.userinfo_endpoint)
            .timeout(UPSTREAM_TIMEOUT)
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| UpstreamError::Unreachable {
                endpoint: "userinfo",
                source: e,
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Rejected {
                endpoint: "userinfo",
                status,
                body,
            });
        }

        let data: serde_json::Value =
            response.json().await.map_err(|e| UpstreamError::Malformed {
                endpoint: "userinfo",
                detail: e.to_string(),
            })?;

        let mapping = &self.config.profile_mapping;
        let id = Self::extract_field(&data, &mapping.id).ok_or_else(|| {
            UpstreamError::Malformed {
                endpoint: "userinfo",
                detail: format!("profile missing subject field '{}'", mapping.id),
            }
        })?;

        Ok(OAuth2UserInfo {
            id,
            name: Self::extract_field(&data, &mapping.name),
            email: Self::extract_field(&data, &mapping.email),
            image: Self::extract_field(&data, &mapping.image),
            email_verified: Self::extract_bool(
                &data,
                &mapping.email_verified,
                mapping.email_verified_default,
            ),
        })
    }

    async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<OAuth2Tokens, UpstreamError> {
        refresh_access_token(RefreshTokenParams {
            refresh_token: refresh_token.to_string(),
            token_endpoint: self.config.token_endpoint.clone(),
            client_id: self.options.client_id.clone(),
            client_secret: self.options.client_secret.clone(),
            authentication: self.config.auth_method,
            scopes: None,
        })
        .await
    }
}
