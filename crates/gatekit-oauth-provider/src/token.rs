// Opaque token and authorization-code minting.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};

use crate::config::OidcProviderOptions;
use crate::types::TokenResponse;

fn random_opaque_token() -> String {
    let bytes: [u8; 32] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn generate_access_token() -> String {
    random_opaque_token()
}

pub fn generate_refresh_token() -> String {
    random_opaque_token()
}

pub fn generate_authorization_code() -> String {
    random_opaque_token()
}

/// Freshly minted token pair with resolved expirations.
#[derive(Debug, Clone)]
pub struct MintedTokens {
    pub access_token: String,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token: Option<String>,
    pub refresh_token_expires_at: Option<DateTime<Utc>>,
}

/// Mint an access token (and refresh token when `include_refresh`) and the
/// matching wire response. The id_token slot is filled by the caller after
/// signing.
pub fn mint_tokens(
    options: &OidcProviderOptions,
    scopes: &[String],
    include_refresh: bool,
) -> (MintedTokens, TokenResponse) {
    let now = Utc::now();
    let access_token = generate_access_token();
    let access_token_expires_at = now + Duration::seconds(options.access_token_expires_in);

    let (refresh_token, refresh_token_expires_at) = if include_refresh {
        (
            Some(generate_refresh_token()),
            Some(now + Duration::seconds(options.refresh_token_expires_in)),
        )
    } else {
        (None, None)
    };

    let response = TokenResponse {
        access_token: access_token.clone(),
        token_type: "Bearer".into(),
        expires_in: options.access_token_expires_in,
        refresh_token: refresh_token.clone(),
        scope: Some(scopes.join(" ")),
        id_token: None,
    };

    (
        MintedTokens {
            access_token,
            access_token_expires_at,
            refresh_token,
            refresh_token_expires_at,
        },
        response,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_unique_and_opaque() {
        let a = generate_access_token();
        let b = generate_refresh_token();
        let c = generate_authorization_code();
        assert_ne!(a, b);
        assert_ne!(b, c);
        // 32 random bytes base64url → 43 chars, well past the 32-byte
        // unguessability floor.
        assert_eq!(a.len(), 43);
    }

    #[test]
    fn mint_with_refresh() {
        let opts = OidcProviderOptions::default();
        let scopes = vec!["openid".to_string(), "offline_access".to_string()];
        let (minted, response) = mint_tokens(&opts, &scopes, true);
        assert!(minted.refresh_token.is_some());
        assert_eq!(response.token_type, "Bearer");
        assert_eq!(response.expires_in, 3600);
        assert_eq!(response.scope.as_deref(), Some("openid offline_access"));
        assert!(minted.access_token_expires_at > Utc::now());
    }

    #[test]
    fn mint_without_refresh() {
        let opts = OidcProviderOptions::default();
        let (minted, response) = mint_tokens(&opts, &["openid".to_string()], false);
        assert!(minted.refresh_token.is_none());
        assert!(response.refresh_token.is_none());
    }
}
