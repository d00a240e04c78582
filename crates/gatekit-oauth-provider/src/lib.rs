#![doc = include_str!("../README.md")]

pub mod config;
pub mod consent;
pub mod discovery;
pub mod error;
pub mod grants;
pub mod pkce;
pub mod token;
pub mod types;

pub use config::OidcProviderOptions;
pub use error::OAuthProviderError;
pub use types::*;
