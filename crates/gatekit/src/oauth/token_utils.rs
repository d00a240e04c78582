// Stored provider-token helpers: optional symmetric encryption at rest.

use crate::context::AuthContext;
use crate::crypto;

/// Encrypt a provider token before storing it, when
/// `account.encrypt_oauth_tokens` is enabled.
pub fn set_token(ctx: &AuthContext, token: Option<&str>) -> Option<String> {
    let token = token?;
    if ctx.options.account.encrypt_oauth_tokens {
        crypto::symmetric_encrypt(&ctx.secret, token).ok()
    } else {
        Some(token.to_string())
    }
}

/// Decrypt a stored provider token for use.
pub fn get_token(ctx: &AuthContext, stored: Option<&str>) -> Option<String> {
    let stored = stored?;
    if ctx.options.account.encrypt_oauth_tokens {
        crypto::symmetric_decrypt(&ctx.secret, stored).ok()
    } else {
        Some(stored.to_string())
    }
}
