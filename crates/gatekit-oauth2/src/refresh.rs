// Refresh-token exchange at the provider's token endpoint.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::code_exchange::UPSTREAM_TIMEOUT;
use crate::error::UpstreamError;
use crate::provider::AuthenticationMethod;
use crate::tokens::OAuth2Tokens;

/// Parameters for refreshing an access token.
#[derive(Debug, Clone)]
pub struct RefreshTokenParams {
    pub refresh_token: String,
    pub token_endpoint: String,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub authentication: AuthenticationMethod,
    /// Narrow the refreshed token's scopes; omitted keeps the original grant.
    pub scopes: Option<Vec<String>>,
}

/// Exchange a refresh token for new tokens.
pub async fn refresh_access_token(
    params: RefreshTokenParams,
) -> Result<OAuth2Tokens, UpstreamError> {
    let client = reqwest::Client::new();

    let mut form = vec![
        ("grant_type".to_string(), "refresh_token".to_string()),
        ("refresh_token".to_string(), params.refresh_token),
    ];

    if let Some(scopes) = &params.scopes {
        form.push(("scope".to_string(), scopes.join(" ")));
    }

    let mut request = client
        .post(&params.token_endpoint)
        .timeout(UPSTREAM_TIMEOUT)
        .header(reqwest::header::ACCEPT, "application/json");

    match params.authentication {
        AuthenticationMethod::Basic => {
            let credentials = format!(
                "{}:{}",
                params.client_id,
                params.client_secret.as_deref().unwrap_or("")
            );
            let encoded = STANDARD.encode(credentials.as_bytes());
            request = request.header(reqwest::header::AUTHORIZATION, format!("Basic {encoded}"));
        }
        AuthenticationMethod::Post | AuthenticationMethod::None => {
            form.push(("client_id".to_string(), params.client_id));
            if let Some(secret) = &params.client_secret {
                form.push(("client_secret".to_string(), secret.clone()));
            }
        }
    }

    let response = request
        .form(&form)
        .send()
        .await
        .map_err(|e| UpstreamError::Unreachable {
            endpoint: "token",
            source: e,
        })?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(UpstreamError::Rejected {
            endpoint: "token",
            status,
            body,
        });
    }

    let data: serde_json::Value =
        response.json().await.map_err(|e| UpstreamError::Malformed {
            endpoint: "token",
            detail: e.to_string(),
        })?;

    Ok(OAuth2Tokens::from_raw(&data))
}
