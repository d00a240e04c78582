// Cookie header parsing and serialization.

use std::collections::HashMap;

/// Attributes of a single cookie.
#[derive(Debug, Clone)]
pub struct CookieAttributes {
    pub value: String,
    pub max_age: Option<i64>,
    pub domain: Option<String>,
    pub path: Option<String>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl std::fmt::Display for SameSite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SameSite::Strict => write!(f, "Strict"),
            SameSite::Lax => write!(f, "Lax"),
            SameSite::None => write!(f, "None"),
        }
    }
}

pub const SECURE_COOKIE_PREFIX: &str = "__Secure-";

/// Parse a `Cookie` header into name → value.
pub fn parse_cookies(cookie_header: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for cookie in cookie_header.split(';') {
        if let Some((name, value)) = cookie.trim().split_once('=') {
            map.insert(name.to_string(), value.to_string());
        }
    }
    map
}

/// Serialize a cookie into a `Set-Cookie` header value.
pub fn serialize_cookie(name: &str, attrs: &CookieAttributes) -> String {
    let mut parts = vec![format!("{}={}", name, attrs.value)];

    if let Some(max_age) = attrs.max_age {
        parts.push(format!("Max-Age={max_age}"));
    }
    if let Some(ref domain) = attrs.domain {
        parts.push(format!("Domain={domain}"));
    }
    if let Some(ref path) = attrs.path {
        parts.push(format!("Path={path}"));
    }
    if attrs.secure {
        parts.push("Secure".into());
    }
    if attrs.http_only {
        parts.push("HttpOnly".into());
    }
    if let Some(same_site) = attrs.same_site {
        parts.push(format!("SameSite={same_site}"));
    }

    parts.join("; ")
}
