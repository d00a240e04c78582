// SSO registration errors. Conflicts and validation failures carry stable
// codes; upstream discovery failures are distinguished as gateway-class.

#[derive(Debug, thiserror::Error)]
pub enum SsoError {
    /// Issuer URL is not a valid absolute http(s) URL.
    #[error("Invalid issuer URL: {0}")]
    InvalidIssuer(String),

    /// providerId already registered — a 409, never a generic 500.
    #[error("Provider '{0}' is already registered")]
    DuplicateProvider(String),

    /// Registration row is missing required configuration.
    #[error("Provider configuration incomplete: {0}")]
    IncompleteConfig(String),

    /// Discovery fetch failed (refused, timeout, non-2xx, malformed).
    #[error("Discovery against {issuer} failed: {detail}")]
    DiscoveryFailed { issuer: String, detail: String },
}

impl SsoError {
    /// Stable machine-readable code for API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidIssuer(_) => "invalid_issuer",
            Self::DuplicateProvider(_) => "provider_already_registered",
            Self::IncompleteConfig(_) => "incomplete_provider_config",
            Self::DiscoveryFailed { .. } => "discovery_unexpected_error",
        }
    }

    /// HTTP status class for the error.
    pub fn status(&self) -> u16 {
        match self {
            Self::InvalidIssuer(_) | Self::IncompleteConfig(_) => 400,
            Self::DuplicateProvider(_) => 409,
            Self::DiscoveryFailed { .. } => 502,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses() {
        assert_eq!(SsoError::InvalidIssuer("x".into()).status(), 400);
        assert_eq!(SsoError::DuplicateProvider("p".into()).status(), 409);
        assert_eq!(
            SsoError::DiscoveryFailed {
                issuer: "https://idp.test".into(),
                detail: "timeout".into()
            }
            .status(),
            502
        );
    }
}
