// Built-in plugins.

pub mod jwt;
pub mod oidc_provider;
