#![doc = include_str!("../README.md")]

pub mod authorization_url;
pub mod code_exchange;
pub mod error;
pub mod pkce;
pub mod provider;
pub mod refresh;
pub mod tokens;

// Re-exports
pub use authorization_url::{create_authorization_url, AuthorizationUrlParams};
pub use code_exchange::{exchange_authorization_code, CodeExchangeParams};
pub use error::UpstreamError;
pub use pkce::{generate_code_challenge, generate_code_verifier};
pub use provider::{
    AuthenticationMethod, GenericOAuthProvider, OAuthProvider, ProviderConfig, ProviderOptions,
};
pub use refresh::{refresh_access_token, RefreshTokenParams};
pub use tokens::{OAuth2Tokens, OAuth2UserInfo};
