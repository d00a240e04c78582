// Random string generation for tokens, state values, and verifiers.

use rand::Rng;

/// Character set: a-z, A-Z, 0-9, -, _ (64 characters, so each character
/// carries 6 bits of entropy).
const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789-_";

/// Generate a random string of the given length.
///
/// Session tokens and OAuth state use length 32 (192 bits of entropy).
pub fn generate_random_string(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correct_length() {
        assert_eq!(generate_random_string(0).len(), 0);
        assert_eq!(generate_random_string(32).len(), 32);
        assert_eq!(generate_random_string(128).len(), 128);
    }

    #[test]
    fn valid_characters() {
        let s = generate_random_string(1000);
        assert!(s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn uniqueness() {
        assert_ne!(generate_random_string(32), generate_random_string(32));
    }
}
