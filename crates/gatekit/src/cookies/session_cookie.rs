// Session cookie and cookie-cache operations.
//
// Handlers push cookies into a ResponseCookies accumulator; the HTTP layer
// turns them into Set-Cookie headers. The cookie cache is a short-TTL signed
// snapshot of the session+user pair; its three encodings (compact, jwt, jwe)
// share one read/write surface.

use serde::{Deserialize, Serialize};

use crate::cookies::chunking::{
    chunk_cookie_value, clean_chunk_cookies, get_chunked_cookie, MAX_COOKIE_SIZE,
};
use crate::cookies::utils::{parse_cookies, CookieAttributes};
use crate::cookies::{sign_cookie_value, AuthCookie, AuthCookies};
use crate::crypto;
use gatekit_core::options::CookieCacheStrategy;

/// Accumulator for Set-Cookie headers.
#[derive(Debug, Clone, Default)]
pub struct ResponseCookies {
    cookies: Vec<(String, String)>,
}

impl ResponseCookies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_cookie(&mut self, name: &str, attrs: &CookieAttributes) {
        let header = crate::cookies::serialize_cookie(name, attrs);
        self.cookies.push((name.to_string(), header));
    }

    /// Set a cookie whose value is `value.HMAC(value)`.
    pub fn set_signed_cookie(
        &mut self,
        name: &str,
        value: &str,
        secret: &str,
        attrs: &CookieAttributes,
    ) {
        if let Ok(signed) = sign_cookie_value(value, secret) {
            let mut signed_attrs = attrs.clone();
            signed_attrs.value = signed;
            self.set_cookie(name, &signed_attrs);
        }
    }

    /// Expire a cookie (empty value, Max-Age=0).
    pub fn expire_cookie(&mut self, cookie: &AuthCookie) {
        let mut attrs = cookie.to_attributes("");
        attrs.max_age = Some(0);
        self.set_cookie(&cookie.name, &attrs);
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.cookies
    }

    pub fn into_headers(self) -> Vec<(String, String)> {
        self.cookies
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

/// Session + user pair carried by the cookie cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUser {
    pub session: serde_json::Value,
    pub user: serde_json::Value,
}

/// Cookie cache encoding configuration.
#[derive(Debug, Clone, Default)]
pub struct CookieCacheConfig {
    pub strategy: CookieCacheStrategy,
    pub version: Option<String>,
}

/// Inputs for setting the session cookie.
#[derive(Debug, Clone)]
pub struct SetSessionCookieParams<'a> {
    pub session_token: &'a str,
    /// None → browser-session cookie (the dont-remember case).
    pub max_age_secs: Option<i64>,
    pub dont_remember: bool,
    /// When set, the cookie cache is (re)written with this payload. The
    /// payload must already be filtered of non-returnable fields.
    pub cache: Option<(&'a SessionUser, u64, CookieCacheConfig)>,
}

/// Set the signed session-token cookie, the dont-remember marker when
/// requested, and the cookie cache when enabled.
pub fn set_session_cookie(
    cookies: &mut ResponseCookies,
    auth_cookies: &AuthCookies,
    secret: &str,
    params: SetSessionCookieParams<'_>,
) {
    let mut attrs = auth_cookies.session_token.to_attributes("");
    attrs.max_age = params.max_age_secs;
    cookies.set_signed_cookie(
        &auth_cookies.session_token.name,
        params.session_token,
        secret,
        &attrs,
    );

    if params.dont_remember {
        let mut drm_attrs = auth_cookies.dont_remember.to_attributes("");
        drm_attrs.max_age = None;
        cookies.set_signed_cookie(&auth_cookies.dont_remember.name, "true", secret, &drm_attrs);
    }

    if let Some((session_user, cache_max_age, config)) = params.cache {
        set_cookie_cache(
            cookies,
            auth_cookies,
            secret,
            session_user,
            params.dont_remember,
            cache_max_age,
            &config,
        );
    }
}

/// Expire the session token, the cache (and its chunks), and the
/// dont-remember marker.
pub fn delete_session_cookie(cookies: &mut ResponseCookies, auth_cookies: &AuthCookies) {
    cookies.expire_cookie(&auth_cookies.session_token);
    cookies.expire_cookie(&auth_cookies.session_data);

    for chunk in clean_chunk_cookies(&auth_cookies.session_data.name, 10) {
        let mut attrs = auth_cookies.session_data.to_attributes("");
        attrs.max_age = Some(0);
        cookies.set_cookie(&chunk.name, &attrs);
    }

    cookies.expire_cookie(&auth_cookies.dont_remember);
}

/// Write the cookie cache.
pub fn set_cookie_cache(
    cookies: &mut ResponseCookies,
    auth_cookies: &AuthCookies,
    secret: &str,
    session_user: &SessionUser,
    dont_remember: bool,
    cache_max_age: u64,
    config: &CookieCacheConfig,
) {
    let max_age = if dont_remember {
        None
    } else {
        Some(cache_max_age as i64)
    };

    let now_ms = chrono::Utc::now().timestamp_millis();
    let version = config.version.as_deref().unwrap_or("1");

    let payload = serde_json::json!({
        "session": session_user.session,
        "user": session_user.user,
        "updatedAt": now_ms,
        "version": version,
    });

    let data = match config.strategy {
        CookieCacheStrategy::Jwe => {
            match crypto::symmetric_encrypt(secret, &payload.to_string()) {
                Ok(encrypted) => encrypted,
                Err(_) => return,
            }
        }
        CookieCacheStrategy::Jwt => {
            match crypto::jwt::sign_jwt(&payload, secret, cache_max_age) {
                Ok(token) => token,
                Err(_) => return,
            }
        }
        CookieCacheStrategy::Compact => {
            let expires_at = now_ms + cache_max_age as i64 * 1000;
            let sign_payload = signing_payload(&payload, expires_at);
            let signature = match crypto::make_signature(&sign_payload, secret) {
                Ok(sig) => sig,
                Err(_) => return,
            };
            let envelope = serde_json::json!({
                "data": payload,
                "expiresAt": expires_at,
                "signature": signature,
            });
            base64_url_encode(&envelope.to_string())
        }
    };

    let attrs_for = |value: String| {
        let mut attrs = auth_cookies.session_data.to_attributes("");
        attrs.value = value;
        attrs.max_age = max_age;
        attrs
    };

    if data.len() > MAX_COOKIE_SIZE {
        for chunk in chunk_cookie_value(&auth_cookies.session_data.name, &data) {
            cookies.set_cookie(&chunk.name, &attrs_for(chunk.value.clone()));
        }
    } else {
        cookies.set_cookie(&auth_cookies.session_data.name, &attrs_for(data));
    }
}

/// Read and verify the cookie cache from a cookie header. `None` when
/// missing, expired, tampered, or from a different version.
pub fn get_cookie_cache(
    cookie_header: &str,
    auth_cookies: &AuthCookies,
    secret: &str,
    config: &CookieCacheConfig,
) -> Option<SessionUser> {
    let cookies = parse_cookies(cookie_header);
    let data = get_chunked_cookie(&cookies, &auth_cookies.session_data.name)?;

    let payload = match config.strategy {
        CookieCacheStrategy::Jwe => {
            let decrypted = crypto::symmetric_decrypt(secret, &data).ok()?;
            serde_json::from_str::<serde_json::Value>(&decrypted).ok()?
        }
        CookieCacheStrategy::Jwt => crypto::jwt::verify_jwt(&data, secret)?,
        CookieCacheStrategy::Compact => {
            let decoded = base64_url_decode(&data)?;
            let envelope: serde_json::Value = serde_json::from_str(&decoded).ok()?;

            let expires_at = envelope["expiresAt"].as_i64()?;
            if chrono::Utc::now().timestamp_millis() > expires_at {
                return None;
            }

            let stored_signature = envelope["signature"].as_str()?;
            let sign_payload = signing_payload(&envelope["data"], expires_at);
            let expected = crypto::make_signature(&sign_payload, secret).ok()?;
            if !crypto::constant_time_equal(expected.as_bytes(), stored_signature.as_bytes()) {
                return None;
            }

            envelope["data"].clone()
        }
    };

    if let Some(expected_version) = config.version.as_deref() {
        if payload["version"].as_str().unwrap_or("1") != expected_version {
            return None;
        }
    }

    let session = payload.get("session")?.clone();
    let user = payload.get("user")?.clone();
    if session.is_null() || user.is_null() {
        return None;
    }

    Some(SessionUser { session, user })
}

/// Canonical string the compact-strategy HMAC covers. Rebuilt field-by-field
/// on read so a tampered envelope never verifies.
fn signing_payload(data: &serde_json::Value, expires_at: i64) -> String {
    serde_json::json!({
        "session": data["session"],
        "user": data["user"],
        "updatedAt": data["updatedAt"],
        "version": data["version"],
        "expiresAt": expires_at,
    })
    .to_string()
}

fn base64_url_encode(data: &str) -> String {
    use base64::Engine;
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(data.as_bytes())
}

fn base64_url_decode(data: &str) -> Option<String> {
    use base64::Engine;
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(data).ok()?;
    String::from_utf8(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatekit_core::options::AuthOptions;

    const SECRET: &str = "test-secret-that-is-long-enough-32";

    fn test_cookies() -> AuthCookies {
        crate::cookies::get_cookies(&AuthOptions::default())
    }

    fn test_session_user() -> SessionUser {
        SessionUser {
            session: serde_json::json!({"id": "s1", "token": "tok1"}),
            user: serde_json::json!({"id": "u1", "email": "a@b.test"}),
        }
    }

    /// Extract the session_data cookie from the accumulator and rebuild a
    /// Cookie header, simulating the browser sending it back.
    fn cache_cookie_header(rc: &ResponseCookies) -> String {
        let (_, set_cookie) = rc
            .headers()
            .iter()
            .find(|(name, _)| name.contains("session_data"))
            .expect("session_data cookie should be set");
        set_cookie.split(';').next().unwrap().to_string()
    }

    #[test]
    fn set_session_cookie_signs_token() {
        let mut rc = ResponseCookies::new();
        set_session_cookie(
            &mut rc,
            &test_cookies(),
            SECRET,
            SetSessionCookieParams {
                session_token: "tok-abc",
                max_age_secs: Some(3600),
                dont_remember: false,
                cache: None,
            },
        );

        let headers = rc.headers();
        let (_, header) = headers
            .iter()
            .find(|(name, _)| name.contains("session_token"))
            .unwrap();
        assert!(header.contains("tok-abc."));
        assert!(header.contains("Max-Age=3600"));
        assert!(header.contains("HttpOnly"));
        assert!(header.contains("SameSite=Lax"));
    }

    #[test]
    fn dont_remember_sets_marker_and_session_scoped_cookie() {
        let mut rc = ResponseCookies::new();
        set_session_cookie(
            &mut rc,
            &test_cookies(),
            SECRET,
            SetSessionCookieParams {
                session_token: "tok",
                max_age_secs: None,
                dont_remember: true,
                cache: None,
            },
        );

        let headers = rc.headers();
        assert!(headers.iter().any(|(name, _)| name.contains("dont_remember")));
        let (_, token_header) = headers
            .iter()
            .find(|(name, _)| name.contains("session_token"))
            .unwrap();
        assert!(!token_header.contains("Max-Age"));
    }

    #[test]
    fn compact_cache_round_trip() {
        let auth_cookies = test_cookies();
        let config = CookieCacheConfig::default();

        let mut rc = ResponseCookies::new();
        set_cookie_cache(
            &mut rc,
            &auth_cookies,
            SECRET,
            &test_session_user(),
            false,
            300,
            &config,
        );

        let cached =
            get_cookie_cache(&cache_cookie_header(&rc), &auth_cookies, SECRET, &config).unwrap();
        assert_eq!(cached.user["email"], "a@b.test");
        assert_eq!(cached.session["id"], "s1");
    }

    #[test]
    fn expired_compact_cache_is_none() {
        let auth_cookies = test_cookies();
        let now_ms = chrono::Utc::now().timestamp_millis();
        let expires_at = now_ms - 1000;

        let payload = serde_json::json!({
            "session": {"id": "s1"},
            "user": {"id": "u1"},
            "updatedAt": now_ms,
            "version": "1",
        });
        let signature =
            crypto::make_signature(&signing_payload(&payload, expires_at), SECRET).unwrap();
        let envelope = serde_json::json!({
            "data": payload,
            "expiresAt": expires_at,
            "signature": signature,
        });
        let header = format!(
            "{}={}",
            auth_cookies.session_data.name,
            base64_url_encode(&envelope.to_string())
        );

        assert!(get_cookie_cache(
            &header,
            &auth_cookies,
            SECRET,
            &CookieCacheConfig::default()
        )
        .is_none());
    }

    #[test]
    fn tampered_compact_cache_is_none() {
        let auth_cookies = test_cookies();
        let config = CookieCacheConfig::default();

        let mut rc = ResponseCookies::new();
        set_cookie_cache(
            &mut rc,
            &auth_cookies,
            SECRET,
            &test_session_user(),
            false,
            300,
            &config,
        );

        // Decode, swap the user id, re-encode without re-signing.
        let header = cache_cookie_header(&rc);
        let value = header.split_once('=').unwrap().1;
        let decoded = base64_url_decode(value).unwrap();
        let mut envelope: serde_json::Value = serde_json::from_str(&decoded).unwrap();
        envelope["data"]["user"]["id"] = serde_json::json!("u-evil");
        let tampered_header = format!(
            "{}={}",
            auth_cookies.session_data.name,
            base64_url_encode(&envelope.to_string())
        );

        assert!(get_cookie_cache(&tampered_header, &auth_cookies, SECRET, &config).is_none());
    }

    #[test]
    fn jwt_cache_round_trip_and_wrong_secret() {
        let auth_cookies = test_cookies();
        let config = CookieCacheConfig {
            strategy: CookieCacheStrategy::Jwt,
            version: None,
        };

        let mut rc = ResponseCookies::new();
        set_cookie_cache(
            &mut rc,
            &auth_cookies,
            SECRET,
            &test_session_user(),
            false,
            300,
            &config,
        );
        let header = cache_cookie_header(&rc);

        assert!(get_cookie_cache(&header, &auth_cookies, SECRET, &config).is_some());
        assert!(get_cookie_cache(&header, &auth_cookies, "other-secret-32-chars-long!!!!!!", &config).is_none());
    }

    #[test]
    fn jwe_cache_round_trip_and_wrong_secret() {
        let auth_cookies = test_cookies();
        let config = CookieCacheConfig {
            strategy: CookieCacheStrategy::Jwe,
            version: None,
        };

        let mut rc = ResponseCookies::new();
        set_cookie_cache(
            &mut rc,
            &auth_cookies,
            SECRET,
            &test_session_user(),
            false,
            300,
            &config,
        );
        let header = cache_cookie_header(&rc);

        assert!(get_cookie_cache(&header, &auth_cookies, SECRET, &config).is_some());
        assert!(get_cookie_cache(&header, &auth_cookies, "other-secret-32-chars-long!!!!!!", &config).is_none());
    }

    #[test]
    fn version_mismatch_invalidates() {
        let auth_cookies = test_cookies();
        let write_config = CookieCacheConfig {
            strategy: CookieCacheStrategy::Compact,
            version: Some("1".into()),
        };

        let mut rc = ResponseCookies::new();
        set_cookie_cache(
            &mut rc,
            &auth_cookies,
            SECRET,
            &test_session_user(),
            false,
            300,
            &write_config,
        );
        let header = cache_cookie_header(&rc);

        assert!(get_cookie_cache(&header, &auth_cookies, SECRET, &write_config).is_some());

        let read_config = CookieCacheConfig {
            strategy: CookieCacheStrategy::Compact,
            version: Some("2".into()),
        };
        assert!(get_cookie_cache(&header, &auth_cookies, SECRET, &read_config).is_none());
    }

    #[test]
    fn delete_expires_everything() {
        let mut rc = ResponseCookies::new();
        delete_session_cookie(&mut rc, &test_cookies());

        let headers = rc.headers();
        assert!(headers.len() >= 3);
        for (_, header) in headers {
            assert!(header.contains("Max-Age=0"));
        }
    }
}
