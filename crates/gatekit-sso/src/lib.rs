#![doc = include_str!("../README.md")]

pub mod discovery;
pub mod error;
pub mod registration;
pub mod types;

pub use discovery::{discover_oidc_config, DiscoveredConfig};
pub use error::SsoError;
pub use registration::{build_registration, validate_issuer, RegisterProviderRequest};
pub use types::{OidcConfig, ProviderRegistration};
