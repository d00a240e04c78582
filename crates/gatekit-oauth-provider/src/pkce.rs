// PKCE verification on the authorization-server side (RFC 7636 §4.6).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::OAuthProviderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeChallengeMethod {
    Plain,
    S256,
}

impl CodeChallengeMethod {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "plain" => Some(Self::Plain),
            "S256" => Some(Self::S256),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::S256 => "S256",
        }
    }
}

/// Derive the challenge for a verifier under the given method.
pub fn derive_code_challenge(verifier: &str, method: CodeChallengeMethod) -> String {
    match method {
        CodeChallengeMethod::Plain => verifier.to_string(),
        CodeChallengeMethod::S256 => {
            let hash = Sha256::digest(verifier.as_bytes());
            URL_SAFE_NO_PAD.encode(hash)
        }
    }
}

/// Verify a presented code_verifier against the stored challenge.
/// Comparison is constant-time.
pub fn verify_code_verifier(
    verifier: &str,
    challenge: &str,
    method: &str,
) -> Result<(), OAuthProviderError> {
    let method =
        CodeChallengeMethod::parse(method).ok_or(OAuthProviderError::InvalidCodeChallenge)?;

    let computed = derive_code_challenge(verifier, method);
    if computed.as_bytes().ct_eq(challenge.as_bytes()).into() {
        Ok(())
    } else {
        Err(OAuthProviderError::InvalidCodeChallenge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s256_round_trip() {
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        let challenge = derive_code_challenge(verifier, CodeChallengeMethod::S256);
        assert_eq!(challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
        assert!(verify_code_verifier(verifier, &challenge, "S256").is_ok());
    }

    #[test]
    fn plain_round_trip() {
        assert!(verify_code_verifier("v", "v", "plain").is_ok());
        assert!(verify_code_verifier("v", "other", "plain").is_err());
    }

    #[test]
    fn wrong_verifier_rejected() {
        let challenge = derive_code_challenge("right", CodeChallengeMethod::S256);
        assert_eq!(
            verify_code_verifier("wrong", &challenge, "S256").unwrap_err(),
            OAuthProviderError::InvalidCodeChallenge
        );
    }

    #[test]
    fn unknown_method_rejected() {
        assert!(verify_code_verifier("v", "c", "S512").is_err());
    }
}
