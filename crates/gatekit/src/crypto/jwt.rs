// HS256 JWT sign/verify. This is the symmetric path used by the cookie
// cache's jwt strategy and by ID tokens when no asymmetric signing key is
// registered.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use gatekit_core::error::AuthError;

/// Sign a payload as an HS256 JWT with `iat`/`exp` claims.
pub fn sign_jwt<T: Serialize>(
    payload: &T,
    secret: &str,
    expires_in_secs: u64,
) -> Result<String, AuthError> {
    let now = chrono::Utc::now().timestamp() as u64;

    let claims = JwtClaims {
        payload: serde_json::to_value(payload)
            .map_err(|e| AuthError::Crypto(format!("Failed to serialize JWT payload: {e}")))?,
        iat: now,
        exp: now + expires_in_secs,
    };

    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());

    jsonwebtoken::encode(&header, &claims, &key)
        .map_err(|e| AuthError::Crypto(format!("JWT signing failed: {e}")))
}

/// Verify and decode an HS256 JWT. `None` for invalid or expired tokens.
pub fn verify_jwt<T: DeserializeOwned>(token: &str, secret: &str) -> Option<T> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let token_data = jsonwebtoken::decode::<JwtClaims>(token, &key, &validation).ok()?;
    serde_json::from_value(token_data.claims.payload).ok()
}

#[derive(Debug, Serialize, Deserialize)]
struct JwtClaims {
    #[serde(flatten)]
    payload: serde_json::Value,
    iat: u64,
    exp: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct TestPayload {
        sub: String,
    }

    #[test]
    fn sign_and_verify() {
        let token = sign_jwt(&TestPayload { sub: "u1".into() }, "secret", 3600).unwrap();
        let decoded: Option<TestPayload> = verify_jwt(&token, "secret");
        assert_eq!(decoded, Some(TestPayload { sub: "u1".into() }));
    }

    #[test]
    fn wrong_secret_rejected() {
        let token = sign_jwt(&TestPayload { sub: "u1".into() }, "right", 3600).unwrap();
        let decoded: Option<TestPayload> = verify_jwt(&token, "wrong");
        assert!(decoded.is_none());
    }
}
