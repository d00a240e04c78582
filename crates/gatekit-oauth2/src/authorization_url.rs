// Authorization URL construction with PKCE, scopes, state, and
// provider-specific extra parameters.

use std::collections::HashMap;

use crate::pkce::generate_code_challenge;

/// Parameters for building an authorization URL.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationUrlParams {
    pub authorization_endpoint: String,
    pub client_id: String,
    pub redirect_uri: String,
    /// CSRF state parameter.
    pub state: String,
    /// PKCE code verifier; when present, an S256 challenge is attached.
    pub code_verifier: Option<String>,
    pub scopes: Vec<String>,
    /// Response type (default: "code").
    pub response_type: Option<String>,
    pub prompt: Option<String>,
    pub login_hint: Option<String>,
    pub response_mode: Option<String>,
    /// Join character for scopes (default: " ").
    pub scope_joiner: Option<String>,
    /// Provider-specific extra query parameters.
    pub additional_params: HashMap<String, String>,
}

/// Build an OAuth2 authorization URL.
pub fn create_authorization_url(
    params: AuthorizationUrlParams,
) -> Result<url::Url, url::ParseError> {
    let mut url = url::Url::parse(&params.authorization_endpoint)?;

    {
        let mut query = url.query_pairs_mut();
        query.append_pair(
            "response_type",
            params.response_type.as_deref().unwrap_or("code"),
        );
        query.append_pair("client_id", &params.client_id);
        query.append_pair("state", &params.state);

        if !params.scopes.is_empty() {
            let joiner = params.scope_joiner.as_deref().unwrap_or(" ");
            query.append_pair("scope", &params.scopes.join(joiner));
        }

        query.append_pair("redirect_uri", &params.redirect_uri);

        if let Some(p) = &params.prompt {
            query.append_pair("prompt", p);
        }
        if let Some(h) = &params.login_hint {
            query.append_pair("login_hint", h);
        }
        if let Some(m) = &params.response_mode {
            query.append_pair("response_mode", m);
        }

        if let Some(verifier) = &params.code_verifier {
            let challenge = generate_code_challenge(verifier);
            query
                .append_pair("code_challenge_method", "S256")
                .append_pair("code_challenge", &challenge);
        }

        for (key, value) in &params.additional_params {
            query.append_pair(key, value);
        }
    }

    Ok(url)
}
