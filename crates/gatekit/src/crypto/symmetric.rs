// XChaCha20-Poly1305 symmetric encryption with SHA-256 key derivation,
// HMAC-SHA256 signatures, and constant-time comparison.

use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    XChaCha20Poly1305, XNonce,
};
use hmac::{digest::KeyInit as HmacKeyInit, Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use gatekit_core::error::AuthError;

type HmacSha256 = Hmac<Sha256>;

/// Encrypt data with XChaCha20-Poly1305.
///
/// The key string is hashed with SHA-256 into a 32-byte key; a random
/// 24-byte nonce is prepended to the ciphertext. Output is hex-encoded.
pub fn symmetric_encrypt(key: &str, data: &str) -> Result<String, AuthError> {
    use sha2::Digest;
    let key_bytes: [u8; 32] = Sha256::digest(key.as_bytes()).into();

    let cipher = XChaCha20Poly1305::new_from_slice(&key_bytes)
        .map_err(|e| AuthError::Crypto(format!("Cipher init failed: {e}")))?;

    let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, data.as_bytes())
        .map_err(|e| AuthError::Crypto(format!("Encryption failed: {e}")))?;

    let mut result = nonce.to_vec();
    result.extend_from_slice(&ciphertext);
    Ok(hex::encode(result))
}

/// Decrypt data produced by `symmetric_encrypt`.
pub fn symmetric_decrypt(key: &str, data: &str) -> Result<String, AuthError> {
    use sha2::Digest;
    let key_bytes: [u8; 32] = Sha256::digest(key.as_bytes()).into();

    let raw = hex::decode(data).map_err(|e| AuthError::Crypto(format!("Invalid hex data: {e}")))?;

    if raw.len() < 24 {
        return Err(AuthError::Crypto("Ciphertext too short (missing nonce)".into()));
    }

    let (nonce_bytes, ciphertext) = raw.split_at(24);
    let nonce = XNonce::from_slice(nonce_bytes);

    let cipher = XChaCha20Poly1305::new_from_slice(&key_bytes)
        .map_err(|e| AuthError::Crypto(format!("Cipher init failed: {e}")))?;

    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|e| AuthError::Crypto(format!("Decryption failed: {e}")))?;

    String::from_utf8(plaintext)
        .map_err(|e| AuthError::Crypto(format!("Invalid UTF-8 plaintext: {e}")))
}

/// HMAC-SHA256 signature, base64-encoded.
pub fn make_signature(value: &str, secret: &str) -> Result<String, AuthError> {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;

    let mut mac = <HmacSha256 as HmacKeyInit>::new_from_slice(secret.as_bytes())
        .map_err(|e| AuthError::Crypto(format!("HMAC init failed: {e}")))?;

    mac.update(value.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Verify an HMAC-SHA256 signature.
pub fn verify_signature(value: &str, secret: &str, signature: &str) -> Result<bool, AuthError> {
    let expected = make_signature(value, secret)?;
    Ok(constant_time_equal(expected.as_bytes(), signature.as_bytes()))
}

/// Compare two byte slices in constant time.
pub fn constant_time_equal(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_round_trip() {
        let encrypted = symmetric_encrypt("key", "payload").unwrap();
        assert_ne!(encrypted, "payload");
        assert_eq!(symmetric_decrypt("key", &encrypted).unwrap(), "payload");
    }

    #[test]
    fn wrong_key_fails() {
        let encrypted = symmetric_encrypt("right", "secret data").unwrap();
        assert!(symmetric_decrypt("wrong", &encrypted).is_err());
    }

    #[test]
    fn nonces_differ_between_calls() {
        let e1 = symmetric_encrypt("k", "same").unwrap();
        let e2 = symmetric_encrypt("k", "same").unwrap();
        assert_ne!(e1, e2);
        assert_eq!(symmetric_decrypt("k", &e1).unwrap(), "same");
        assert_eq!(symmetric_decrypt("k", &e2).unwrap(), "same");
    }

    #[test]
    fn signature_shape_and_verification() {
        let sig = make_signature("hello", "secret").unwrap();
        // base64 of 32 HMAC bytes is 44 chars.
        assert_eq!(sig.len(), 44);
        assert!(verify_signature("hello", "secret", &sig).unwrap());
        assert!(!verify_signature("hello", "other", &sig).unwrap());
        assert!(!verify_signature("tampered", "secret", &sig).unwrap());
    }

    #[test]
    fn constant_time_equal_basics() {
        assert!(constant_time_equal(b"abc", b"abc"));
        assert!(!constant_time_equal(b"abc", b"abd"));
        assert!(!constant_time_equal(b"abc", b"ab"));
    }
}
