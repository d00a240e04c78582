// Password hashing with scrypt (N=16384, r=16, p=1, dkLen=64).
// Hash format: "hex(salt):hex(key)" with a random 16-byte salt.

use rand::RngCore;
use scrypt::{scrypt, Params};

use gatekit_core::error::AuthError;

/// Hash a password. Returns `salt:key`, both hex-encoded.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let mut salt_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt_bytes);
    let salt_hex = hex::encode(salt_bytes);

    let key = generate_key(password, &salt_hex)?;
    Ok(format!("{}:{}", salt_hex, hex::encode(key)))
}

/// Verify a password against a hash produced by `hash_password`.
/// Comparison is constant-time.
pub fn verify_password(hash: &str, password: &str) -> Result<bool, AuthError> {
    let (salt, key_hex) = hash
        .split_once(':')
        .ok_or_else(|| AuthError::Crypto("Invalid password hash format".into()))?;

    let expected_key = hex::decode(key_hex)
        .map_err(|e| AuthError::Crypto(format!("Invalid hex in password hash: {e}")))?;

    let derived_key = generate_key(password, salt)?;

    Ok(super::symmetric::constant_time_equal(&derived_key, &expected_key))
}

fn generate_key(password: &str, salt: &str) -> Result<Vec<u8>, AuthError> {
    // N=16384 → log2(N)=14
    let params = Params::new(14, 16, 1, 64)
        .map_err(|e| AuthError::Crypto(format!("Invalid scrypt params: {e}")))?;

    let mut output = vec![0u8; 64];
    scrypt(password.as_bytes(), salt.as_bytes(), &params, &mut output)
        .map_err(|e| AuthError::Crypto(format!("scrypt failed: {e}")))?;

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify() {
        let hash = hash_password("hunter2-but-longer").unwrap();
        let (salt, key) = hash.split_once(':').unwrap();
        assert_eq!(salt.len(), 32);
        assert_eq!(key.len(), 128);

        assert!(verify_password(&hash, "hunter2-but-longer").unwrap());
        assert!(!verify_password(&hash, "wrong-password").unwrap());
    }

    #[test]
    fn salts_differ() {
        let h1 = hash_password("same").unwrap();
        let h2 = hash_password("same").unwrap();
        assert_ne!(h1, h2);
    }

    #[test]
    fn malformed_hash_rejected() {
        assert!(verify_password("no-colon-here", "pw").is_err());
    }
}
