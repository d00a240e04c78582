// JWT signing-key plugin: holds an Ed25519 keypair, signs ID tokens with
// EdDSA, and publishes the public key as a JWK. The OIDC provider detects
// this capability; without it, ID tokens fall back to HMAC with the server
// secret and the JWKS endpoint stays empty.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ed25519_dalek::pkcs8::EncodePrivateKey;
use ed25519_dalek::SigningKey;
use jsonwebtoken::{Algorithm, EncodingKey, Header};

use gatekit_core::error::AuthError;
use gatekit_core::plugin::AuthPlugin;

/// Capability the OIDC provider probes for: asymmetric ID-token signing
/// plus public key material for the JWKS endpoint.
pub trait SigningKeyProvider: Send + Sync {
    /// Sign a complete claim set (including exp/iat) as a JWT.
    fn sign_id_token(&self, claims: &serde_json::Value) -> Result<String, AuthError>;

    /// Public keys for `/jwks`. Private material never appears here.
    fn public_jwks(&self) -> serde_json::Value;

    /// JWS algorithm name advertised in discovery metadata.
    fn algorithm(&self) -> &'static str;
}

/// Ed25519-backed signing key plugin.
pub struct JwtPlugin {
    signing_key: SigningKey,
    key_id: String,
}

impl std::fmt::Debug for JwtPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtPlugin")
            .field("key_id", &self.key_id)
            .finish()
    }
}

impl JwtPlugin {
    /// Generate a fresh keypair. Deployments wanting stable keys across
    /// restarts construct from persisted key bytes instead.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);
        Self::from_signing_key(signing_key)
    }

    pub fn from_key_bytes(secret: &[u8; 32]) -> Self {
        Self::from_signing_key(SigningKey::from_bytes(secret))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        // kid = base64url of the first 8 public-key bytes; enough to pick a
        // key out of a rotated set.
        let public = signing_key.verifying_key().to_bytes();
        let key_id = URL_SAFE_NO_PAD.encode(&public[..8]);
        Self {
            signing_key,
            key_id,
        }
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }
}

impl AuthPlugin for JwtPlugin {
    fn id(&self) -> &str {
        "jwt"
    }

    fn name(&self) -> &str {
        "JWT signing keys"
    }
}

impl SigningKeyProvider for JwtPlugin {
    fn sign_id_token(&self, claims: &serde_json::Value) -> Result<String, AuthError> {
        let der = self
            .signing_key
            .to_pkcs8_der()
            .map_err(|e| AuthError::Crypto(format!("Key export failed: {e}")))?;
        let key = EncodingKey::from_ed_der(der.as_bytes());

        let mut header = Header::new(Algorithm::EdDSA);
        header.kid = Some(self.key_id.clone());

        jsonwebtoken::encode(&header, claims, &key)
            .map_err(|e| AuthError::Crypto(format!("ID token signing failed: {e}")))
    }

    fn public_jwks(&self) -> serde_json::Value {
        let public = self.signing_key.verifying_key().to_bytes();
        serde_json::json!({
            "keys": [{
                "kty": "OKP",
                "crv": "Ed25519",
                "alg": "EdDSA",
                "use": "sig",
                "kid": self.key_id,
                "x": URL_SAFE_NO_PAD.encode(public),
            }]
        })
    }

    fn algorithm(&self) -> &'static str {
        "EdDSA"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jwks_exposes_only_public_material() {
        let plugin = JwtPlugin::generate();
        let jwks = plugin.public_jwks();
        let key = &jwks["keys"][0];
        assert_eq!(key["kty"], "OKP");
        assert_eq!(key["crv"], "Ed25519");
        assert!(key["x"].is_string());
        assert!(key.get("d").is_none());
    }

    #[test]
    fn signed_token_verifies_with_public_key() {
        use jsonwebtoken::{DecodingKey, Validation};

        let plugin = JwtPlugin::generate();
        let now = chrono::Utc::now().timestamp();
        let claims = serde_json::json!({
            "iss": "https://auth.example.com",
            "sub": "u1",
            "aud": "client-1",
            "iat": now,
            "exp": now + 3600,
        });

        let token = plugin.sign_id_token(&claims).unwrap();

        let jwks = plugin.public_jwks();
        let x = jwks["keys"][0]["x"].as_str().unwrap();
        let key = DecodingKey::from_ed_components(x).unwrap();

        let mut validation = Validation::new(Algorithm::EdDSA);
        validation.set_audience(&["client-1"]);
        let decoded =
            jsonwebtoken::decode::<serde_json::Value>(&token, &key, &validation).unwrap();
        assert_eq!(decoded.claims["sub"], "u1");
    }

    #[test]
    fn stable_keys_from_bytes() {
        let secret = [7u8; 32];
        let a = JwtPlugin::from_key_bytes(&secret);
        let b = JwtPlugin::from_key_bytes(&secret);
        assert_eq!(a.key_id(), b.key_id());
        assert_eq!(a.public_jwks(), b.public_jwks());
    }
}
