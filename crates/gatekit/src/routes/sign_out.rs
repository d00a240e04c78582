// Sign-out: revoke the caller's session and clear every auth cookie.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::context::AuthContext;
use crate::cookies::{delete_session_cookie, parse_cookies, verify_signed_cookie, ResponseCookies};
use crate::internal_adapter::AdapterError;

#[derive(Debug, Serialize)]
pub struct SignOutResponse {
    pub success: bool,
}

/// Revoke the current session. Succeeds (and clears cookies) even when the
/// cookie no longer maps to a live session.
pub async fn handle_sign_out(
    ctx: &Arc<AuthContext>,
    cookie_header: &str,
    headers: &HashMap<String, String>,
    cookies: &mut ResponseCookies,
) -> Result<SignOutResponse, AdapterError> {
    let cookie_map = parse_cookies(cookie_header);

    if let Some(token) = cookie_map
        .get(&ctx.auth_cookies.session_token.name)
        .and_then(|signed| verify_signed_cookie(signed, &ctx.secret))
    {
        let tenant = ctx.tenant_from_headers(headers);
        ctx.adapter.delete_session(&token, tenant.as_deref()).await?;
    }

    delete_session_cookie(cookies, &ctx.auth_cookies);
    Ok(SignOutResponse { success: true })
}
