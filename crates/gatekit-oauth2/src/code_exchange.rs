// Authorization code exchange at the provider's token endpoint.
//
// Supports client_secret_basic (Authorization header), client_secret_post
// (body params), and public clients (no secret). Requests carry a bounded
// timeout; failures surface as UpstreamError.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::UpstreamError;
use crate::provider::AuthenticationMethod;
use crate::tokens::OAuth2Tokens;

/// Timeout applied to every token-endpoint request.
pub(crate) const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);

/// Parameters for exchanging an authorization code.
#[derive(Debug, Clone)]
pub struct CodeExchangeParams {
    pub code: String,
    /// Must match the redirect_uri used in the authorization request.
    pub redirect_uri: String,
    pub token_endpoint: String,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub code_verifier: Option<String>,
    pub authentication: AuthenticationMethod,
}

/// Exchange an authorization code for tokens.
pub async fn exchange_authorization_code(
    params: CodeExchangeParams,
) -> Result<OAuth2Tokens, UpstreamError> {
    let client = reqwest::Client::new();

    let mut form = vec![
        ("grant_type".to_string(), "authorization_code".to_string()),
        ("code".to_string(), params.code),
        ("redirect_uri".to_string(), params.redirect_uri),
    ];

    if let Some(verifier) = &params.code_verifier {
        form.push(("code_verifier".to_string(), verifier.clone()));
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
        AuthenticationMethod::Post => {
            form.push(("client_id".to_string(), params.client_id));
            if let Some(secret) = &params.client_secret {
                form.push(("client_secret".to_string(), secret.clone()));
            }
        }
        AuthenticationMethod::None => {
            form.push(("client_id".to_string(), params.client_id));
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

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_endpoint_maps_to_upstream_error() {
        // Port 1 on loopback refuses immediately.
        let result = exchange_authorization_code(CodeExchangeParams {
            code: "c".into(),
            redirect_uri: "https://app.example.com/cb".into(),
            token_endpoint: "http://127.0.0.1:1/token".into(),
            client_id: "id".into(),
            client_secret: None,
            code_verifier: None,
            authentication: AuthenticationMethod::Post,
        })
        .await;

        match result {
            Err(err @ UpstreamError::Unreachable { .. }) => {
                assert_eq!(err.redirect_code(), "oauth_token_unexpected_error");
            }
            other => panic!("expected Unreachable, got {other:?}"),
        }
    }
}
