// Cookie management: the auth cookie set, HMAC-signed values, and the
// session cookie + cookie cache operations route handlers use.

pub mod chunking;
pub mod session_cookie;
pub mod utils;

pub use chunking::{chunk_cookie_value, clean_chunk_cookies, get_chunked_cookie, CookieChunk};
pub use session_cookie::{
    delete_session_cookie, get_cookie_cache, set_session_cookie, CookieCacheConfig,
    ResponseCookies, SessionUser, SetSessionCookieParams,
};
pub use utils::*;

use crate::crypto;
use gatekit_core::options::AuthOptions;

/// The set of auth-related cookies.
#[derive(Debug, Clone)]
pub struct AuthCookies {
    pub session_token: AuthCookie,
    pub session_data: AuthCookie,
    pub dont_remember: AuthCookie,
}

/// A single auth cookie definition (name + default attributes).
#[derive(Debug, Clone)]
pub struct AuthCookie {
    pub name: String,
    pub secure: bool,
    pub same_site: SameSite,
    pub path: String,
    pub http_only: bool,
    pub max_age: Option<i64>,
    pub domain: Option<String>,
}

impl AuthCookie {
    pub fn to_attributes(&self, value: &str) -> CookieAttributes {
        CookieAttributes {
            value: value.to_string(),
            max_age: self.max_age,
            domain: self.domain.clone(),
            path: Some(self.path.clone()),
            secure: self.secure,
            http_only: self.http_only,
            same_site: Some(self.same_site),
        }
    }
}

/// Create an auth cookie with the standard naming convention:
/// `[__Secure-]{prefix}.{name}`.
pub fn create_auth_cookie(
    cookie_name: &str,
    prefix: &str,
    secure: bool,
    cross_subdomain: Option<&str>,
    max_age: Option<i64>,
) -> AuthCookie {
    let secure_prefix = if secure { SECURE_COOKIE_PREFIX } else { "" };
    AuthCookie {
        name: format!("{secure_prefix}{prefix}.{cookie_name}"),
        secure,
        same_site: SameSite::Lax,
        path: "/".to_string(),
        http_only: true,
        max_age,
        domain: cross_subdomain.map(String::from),
    }
}

/// Build the full cookie set from options.
pub fn get_cookies(options: &AuthOptions) -> AuthCookies {
    let secure = options
        .base_url
        .as_deref()
        .map(|u| u.starts_with("https://"))
        .unwrap_or(false);

    let prefix = options.advanced.cookie_prefix.as_deref().unwrap_or("gatekit");

    let cross_subdomain = options
        .advanced
        .cross_sub_domain_cookies
        .as_ref()
        .filter(|c| c.enabled)
        .and_then(|c| c.domain.as_deref());

    let session_max_age = options.session.expires_in as i64;
    let cache_max_age = options.session.cookie_cache.max_age as i64;

    AuthCookies {
        session_token: create_auth_cookie(
            "session_token",
            prefix,
            secure,
            cross_subdomain,
            Some(session_max_age),
        ),
        session_data: create_auth_cookie(
            "session_data",
            prefix,
            secure,
            cross_subdomain,
            Some(cache_max_age),
        ),
        dont_remember: create_auth_cookie("dont_remember", prefix, secure, cross_subdomain, None),
    }
}

/// Read the raw session-token cookie value from a cookie header.
pub fn get_session_cookie_value(
    cookie_header: &str,
    cookie_prefix: Option<&str>,
) -> Option<String> {
    let prefix = cookie_prefix.unwrap_or("gatekit");
    let full_name = format!("{prefix}.session_token");
    let secure_name = format!("{SECURE_COOKIE_PREFIX}{full_name}");

    let cookies = parse_cookies(cookie_header);
    cookies
        .get(&full_name)
        .or_else(|| cookies.get(&secure_name))
        .cloned()
}

/// Create an HMAC-signed cookie value: `value.signature`.
pub fn sign_cookie_value(value: &str, secret: &str) -> Result<String, gatekit_core::error::AuthError> {
    let signature = crypto::make_signature(value, secret)?;
    Ok(format!("{value}.{signature}"))
}

/// Verify a signed cookie and extract the value. `None` when the signature
/// does not match.
pub fn verify_signed_cookie(cookie_value: &str, secret: &str) -> Option<String> {
    let dot_pos = cookie_value.rfind('.')?;
    let (value, signature) = cookie_value.split_at(dot_pos);
    let signature = &signature[1..];

    let expected = crypto::make_signature(value, secret).ok()?;
    if crypto::constant_time_equal(expected.as_bytes(), signature.as_bytes()) {
        Some(value.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_names_from_defaults() {
        let options = AuthOptions::default();
        let cookies = get_cookies(&options);
        assert_eq!(cookies.session_token.name, "gatekit.session_token");
        assert_eq!(cookies.session_data.name, "gatekit.session_data");
        assert_eq!(cookies.dont_remember.name, "gatekit.dont_remember");
        assert!(!cookies.session_token.secure);
    }

    #[test]
    fn https_base_url_enables_secure_prefix() {
        let mut options = AuthOptions::default();
        options.base_url = Some("https://example.com".into());
        let cookies = get_cookies(&options);
        assert!(cookies.session_token.secure);
        assert!(cookies.session_token.name.starts_with(SECURE_COOKIE_PREFIX));
    }

    #[test]
    fn sign_and_verify_cookie() {
        let signed = sign_cookie_value("token-123", "secret").unwrap();
        assert!(signed.starts_with("token-123."));
        assert_eq!(
            verify_signed_cookie(&signed, "secret").as_deref(),
            Some("token-123")
        );
        assert!(verify_signed_cookie(&signed, "other-secret").is_none());
    }

    #[test]
    fn unsigned_value_rejected() {
        assert!(verify_signed_cookie("no-signature-here", "secret").is_none());
    }

    #[test]
    fn session_cookie_lookup() {
        let header = "gatekit.session_token=abc.sig; other=1";
        assert_eq!(
            get_session_cookie_value(header, None).as_deref(),
            Some("abc.sig")
        );
        assert!(get_session_cookie_value("other=1", None).is_none());
    }
}
