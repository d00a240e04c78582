// Upstream error type for calls to third-party identity providers.
//
// Connection failures (refused, timeout, DNS) and malformed responses are
// kept distinct from protocol-level rejections so the caller can surface a
// gateway-class error without leaking upstream response bodies to the
// browser.

/// Failure talking to an upstream identity provider.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// The request never completed: refused, timed out, or DNS failure.
    #[error("{endpoint} request failed: {source}")]
    Unreachable {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The endpoint answered with a non-2xx status. The body is retained for
    /// server-side logging only.
    #[error("{endpoint} returned {status}")]
    Rejected {
        endpoint: &'static str,
        status: u16,
        body: String,
    },

    /// The endpoint answered 2xx but the body could not be parsed.
    #[error("{endpoint} returned a malformed response: {detail}")]
    Malformed {
        endpoint: &'static str,
        detail: String,
    },
}

impl UpstreamError {
    /// The error code surfaced in redirects, e.g. "oauth_token_unexpected_error".
    pub fn redirect_code(&self) -> String {
        let endpoint = match self {
            Self::Unreachable { endpoint, .. }
            | Self::Rejected { endpoint, .. }
            | Self::Malformed { endpoint, .. } => endpoint,
        };
        format!("oauth_{endpoint}_unexpected_error")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_code_names_the_endpoint() {
        let err = UpstreamError::Rejected {
            endpoint: "token",
            status: 500,
            body: "boom".into(),
        };
        assert_eq!(err.redirect_code(), "oauth_token_unexpected_error");
    }
}
