// OIDC discovery against a registered issuer
// (`{issuer}/.well-known/openid-configuration`), with a bounded timeout.

use std::time::Duration;

use serde::Deserialize;

use crate::error::SsoError;

const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// The endpoint subset hydrated from a discovery document.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveredConfig {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub jwks_uri: String,
    #[serde(default)]
    pub userinfo_endpoint: Option<String>,
}

/// Fetch and parse the issuer's discovery document.
pub async fn discover_oidc_config(issuer: &str) -> Result<DiscoveredConfig, SsoError> {
    let url = format!(
        "{}/.well-known/openid-configuration",
        issuer.trim_end_matches('/')
    );

    let response = reqwest::Client::new()
        .get(&url)
        .timeout(DISCOVERY_TIMEOUT)
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await
        .map_err(|e| SsoError::DiscoveryFailed {
            issuer: issuer.to_string(),
            detail: e.to_string(),
        })?;

    if !response.status().is_success() {
        return Err(SsoError::DiscoveryFailed {
            issuer: issuer.to_string(),
            detail: format!("discovery endpoint returned {}", response.status()),
        });
    }

    let config: DiscoveredConfig =
        response.json().await.map_err(|e| SsoError::DiscoveryFailed {
            issuer: issuer.to_string(),
            detail: format!("malformed discovery document: {e}"),
        })?;

    // An issuer claiming to be someone else is a misconfigured (or hostile)
    // IdP; reject instead of silently trusting the document.
    if config.issuer.trim_end_matches('/') != issuer.trim_end_matches('/') {
        return Err(SsoError::DiscoveryFailed {
            issuer: issuer.to_string(),
            detail: format!("document issuer mismatch: {}", config.issuer),
        });
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_issuer_is_gateway_error() {
        let err = discover_oidc_config("http://127.0.0.1:1").await.unwrap_err();
        assert_eq!(err.code(), "discovery_unexpected_error");
        assert_eq!(err.status(), 502);
    }
}
