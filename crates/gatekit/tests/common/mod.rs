// Shared test fixtures: a context over the in-memory adapter, plus cookie
// helpers for simulating the browser side of a flow.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use gatekit::context::{AuthContext, AuthContextBuilder};
use gatekit::cookies::ResponseCookies;
use gatekit_core::options::AuthOptions;
use gatekit_memory::MemoryAdapter;

pub const SECRET: &str = "integration-test-secret-0123456789abcdef";

pub struct TestHarness {
    pub ctx: Arc<AuthContext>,
    pub store: MemoryAdapter,
}

pub fn harness_with(mut options: AuthOptions) -> TestHarness {
    options.secret = SECRET.to_string();
    if options.base_url.is_none() {
        options.base_url = Some("http://app.test".to_string());
    }
    let store = MemoryAdapter::new();
    let ctx = AuthContextBuilder::new(options, Arc::new(store.clone())).build();
    TestHarness { ctx, store }
}

pub fn harness() -> TestHarness {
    harness_with(AuthOptions::default())
}

/// Cookie header carrying a signed session token (what the browser would
/// send back after sign-in).
pub fn session_cookie_header(ctx: &AuthContext, token: &str) -> String {
    let signed = gatekit::cookies::sign_cookie_value(token, &ctx.secret).unwrap();
    format!("{}={}", ctx.auth_cookies.session_token.name, signed)
}

/// Convert Set-Cookie headers from a response into a Cookie request header,
/// dropping expired cookies.
pub fn cookies_to_header(cookies: &ResponseCookies) -> String {
    cookies
        .headers()
        .iter()
        .filter(|(_, header)| !header.contains("Max-Age=0"))
        .map(|(_, header)| header.split(';').next().unwrap_or_default().to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub fn no_headers() -> HashMap<String, String> {
    HashMap::new()
}

pub fn tenant_headers(tenant: &str) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    headers.insert("x-tenant-id".to_string(), tenant.to_string());
    headers
}
