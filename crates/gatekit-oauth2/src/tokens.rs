// OAuth2 token response parsing and the normalized user-info shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Parsed OAuth2 token response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuth2Tokens {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token_expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token_expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    /// Raw token response, preserving provider-specific fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,
}

/// Raw token response wire shape (snake_case).
#[derive(Debug, Deserialize, Default)]
struct RawTokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    token_type: Option<String>,
    expires_in: Option<i64>,
    refresh_token_expires_in: Option<i64>,
    scope: Option<String>,
    id_token: Option<String>,
}

impl OAuth2Tokens {
    /// Parse a raw provider token response, resolving relative expirations
    /// against the current clock.
    pub fn from_raw(data: &serde_json::Value) -> Self {
        let raw: RawTokenResponse = serde_json::from_value(data.clone()).unwrap_or_default();

        let now = Utc::now();
        let access_token_expires_at = raw
            .expires_in
            .map(|secs| now + chrono::Duration::seconds(secs));
        let refresh_token_expires_at = raw
            .refresh_token_expires_in
            .map(|secs| now + chrono::Duration::seconds(secs));

        let scopes = raw
            .scope
            .map(|s| s.split(' ').map(String::from).collect())
            .unwrap_or_default();

        Self {
            token_type: raw.token_type,
            access_token: raw.access_token,
            refresh_token: raw.refresh_token,
            access_token_expires_at,
            refresh_token_expires_at,
            scopes,
            id_token: raw.id_token,
            raw: Some(data.clone()),
        }
    }
}

/// Normalized user information extracted from a provider profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuth2UserInfo {
    /// Subject identifier at the provider.
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub email_verified: bool,
}
