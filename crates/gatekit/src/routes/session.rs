// Session endpoints.
//
//   GET  /session                 — resolve the caller's session
//   GET  /user/list-sessions      — active sessions for the caller
//   POST /user/revoke-session     — revoke one session by token
//   POST /user/revoke-sessions    — revoke all of the caller's sessions
//   POST /user/set-active-organization, /user/set-active-team
//
// get-session is the hot path: cookie-cache fast path first, then the store,
// then rolling renewal throttled by update_age.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::context::AuthContext;
use crate::cookies::{
    delete_session_cookie, get_cookie_cache, set_session_cookie, verify_signed_cookie,
    parse_cookies, ResponseCookies, SessionUser, SetSessionCookieParams,
};
use crate::internal_adapter::{AdapterError, CreateSessionOptions};
use gatekit_core::db::schema::filter_returned;
use gatekit_core::hooks::{HookEvent, HookResult};

// ─── Types ───────────────────────────────────────────────────────

/// The session+user pair returned to the client.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub session: serde_json::Value,
    pub user: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: bool,
}

/// Query parameters for get-session.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetSessionQuery {
    /// Bypass the cookie cache and read from the store.
    #[serde(default)]
    pub disable_cookie_cache: bool,
    /// Do not extend the session on this read.
    #[serde(default)]
    pub disable_refresh: bool,
}

/// Outcome of get-session: the response (None = unauthenticated) plus the
/// cookies the transport must set.
#[derive(Debug)]
pub struct GetSessionResult {
    pub response: Option<SessionResponse>,
    pub cookies: ResponseCookies,
}

impl GetSessionResult {
    fn unauthenticated(cookies: ResponseCookies) -> Self {
        Self {
            response: None,
            cookies,
        }
    }
}

// ─── Freshness ───────────────────────────────────────────────────

/// Whether a session is recent enough for sensitive operations (password
/// change, account deletion). `fresh_age_secs == 0` disables the check.
pub fn is_session_fresh(session: &serde_json::Value, fresh_age_secs: u64) -> bool {
    if fresh_age_secs == 0 {
        return true;
    }

    let last_updated = parse_datetime_field(session, "updatedAt")
        .or_else(|| parse_datetime_field(session, "createdAt"));

    match last_updated {
        Some(updated) => (Utc::now() - updated).num_seconds() < fresh_age_secs as i64,
        None => false,
    }
}

// ─── Session creation (sign-in flows call this) ──────────────────

/// Create a session for a user and set the session cookie (plus cookie
/// cache when enabled). Shared by credential sign-in and the OAuth callback.
///
/// Before-hooks may veto the creation or contribute extra session fields.
pub async fn issue_session(
    ctx: &Arc<AuthContext>,
    user_id: &str,
    user: &serde_json::Value,
    mut options: CreateSessionOptions,
    cookies: &mut ResponseCookies,
) -> Result<serde_json::Value, AdapterError> {
    let hook_payload = serde_json::json!({ "userId": user_id, "user": user });
    match ctx
        .async_hooks
        .run_before(HookEvent::BeforeSessionCreate, &hook_payload)
        .await
    {
        HookResult::Cancel(reason) => {
            return Err(AdapterError::Database(format!(
                "Session creation cancelled by hook: {}",
                reason.unwrap_or_default()
            )));
        }
        HookResult::Continue(Some(modified)) => {
            if let Some(extra) = modified.get("session").and_then(|v| v.as_object()) {
                options.overrides = Some(extra.clone());
            }
        }
        HookResult::Continue(None) => {}
    }

    let dont_remember = options.dont_remember;
    let session = ctx
        .adapter
        .create_session(user_id, options, ctx.session_config.expires_in as i64)
        .await?;

    ctx.async_hooks
        .run_after(HookEvent::AfterSessionCreate, &session)
        .await;

    let token = session["token"].as_str().unwrap_or_default().to_string();
    let session_user = filtered_session_user(ctx, &session, user);

    let cache = ctx.session_config.cookie_cache_enabled.then(|| {
        (
            &session_user,
            ctx.session_config.cookie_cache_max_age,
            ctx.cookie_cache_config(),
        )
    });

    set_session_cookie(
        cookies,
        &ctx.auth_cookies,
        &ctx.secret,
        SetSessionCookieParams {
            session_token: &token,
            max_age_secs: if dont_remember {
                None
            } else {
                Some(remaining_max_age(&session, ctx.session_config.expires_in))
            },
            dont_remember,
            cache,
        },
    );

    Ok(session)
}

// ─── getSession ──────────────────────────────────────────────────

/// Resolve the caller's session from request headers.
///
/// 1. Verify the signed session-token cookie; absent/invalid → None.
/// 2. Cookie-cache fast path (unless disabled) — no store read.
/// 3. Store read, tenant-scoped; missing or expired → clean up, None.
/// 4. dont_remember marker suppresses rolling renewal.
/// 5. Past the renewal threshold, extend expiresAt and re-sign the cookie;
///    an update that matches no row means a concurrent revocation won.
pub async fn handle_get_session(
    ctx: &Arc<AuthContext>,
    cookie_header: &str,
    headers: &HashMap<String, String>,
    query: GetSessionQuery,
) -> Result<GetSessionResult, AdapterError> {
    let mut cookies = ResponseCookies::new();
    let cookie_map = parse_cookies(cookie_header);

    // 1. Signed token cookie.
    let Some(signed_token) = cookie_map.get(&ctx.auth_cookies.session_token.name) else {
        return Ok(GetSessionResult::unauthenticated(cookies));
    };
    let Some(token) = verify_signed_cookie(signed_token, &ctx.secret) else {
        return Ok(GetSessionResult::unauthenticated(cookies));
    };

    let dont_remember = cookie_map
        .get(&ctx.auth_cookies.dont_remember.name)
        .and_then(|v| verify_signed_cookie(v, &ctx.secret))
        .is_some();

    let tenant = ctx.tenant_from_headers(headers);

    // 2. Cookie-cache fast path.
    if ctx.session_config.cookie_cache_enabled && !query.disable_cookie_cache {
        if let Some(cached) = get_cookie_cache(
            cookie_header,
            &ctx.auth_cookies,
            &ctx.secret,
            &ctx.cookie_cache_config(),
        ) {
            // The cache TTL is short, but the session itself may still have
            // expired inside that window.
            let live = parse_datetime_field(&cached.session, "expiresAt")
                .map(|exp| exp > Utc::now())
                .unwrap_or(false);
            if live {
                return Ok(GetSessionResult {
                    response: Some(SessionResponse {
                        session: cached.session,
                        user: cached.user,
                    }),
                    cookies,
                });
            }
        }
    }

    // 3. Store read.
    let Some(session_user) = ctx
        .adapter
        .find_session_and_user(&token, tenant.as_deref())
        .await?
    else {
        delete_session_cookie(&mut cookies, &ctx.auth_cookies);
        return Ok(GetSessionResult::unauthenticated(cookies));
    };

    let expires_at = match parse_datetime_field(&session_user.session, "expiresAt") {
        Some(exp) if exp >= Utc::now() => exp,
        // Expired or unparseable: lazy cleanup on read.
        _ => {
            let _ = ctx.adapter.delete_session(&token, tenant.as_deref()).await;
            delete_session_cookie(&mut cookies, &ctx.auth_cookies);
            return Ok(GetSessionResult::unauthenticated(cookies));
        }
    };

    let filtered = filtered_session_user(ctx, &session_user.session, &session_user.user);

    // 4. Renewal suppressed?
    if dont_remember || query.disable_refresh || ctx.session_config.disable_session_refresh {
        return Ok(GetSessionResult {
            response: Some(SessionResponse {
                session: filtered.session,
                user: filtered.user,
            }),
            cookies,
        });
    }

    // 5. Rolling renewal, throttled: due at expiresAt - expiresIn + updateAge.
    let expires_in = ctx.session_config.expires_in as i64;
    let update_age = ctx.session_config.update_age as i64;
    let due_to_be_updated_at =
        expires_at - TimeDelta::seconds(expires_in) + TimeDelta::seconds(update_age);

    if Utc::now() >= due_to_be_updated_at {
        let new_expires = Utc::now() + TimeDelta::seconds(expires_in);
        let update = serde_json::json!({
            "expiresAt": new_expires.to_rfc3339(),
            "updatedAt": Utc::now().to_rfc3339(),
        });

        let Some(updated_session) = ctx
            .adapter
            .update_session(&token, update, tenant.as_deref())
            .await?
        else {
            // Renewal raced a revocation; the deletion wins.
            delete_session_cookie(&mut cookies, &ctx.auth_cookies);
            return Ok(GetSessionResult::unauthenticated(cookies));
        };

        let refreshed = filtered_session_user(ctx, &updated_session, &session_user.user);
        let cache = ctx.session_config.cookie_cache_enabled.then(|| {
            (
                &refreshed,
                ctx.session_config.cookie_cache_max_age,
                ctx.cookie_cache_config(),
            )
        });
        set_session_cookie(
            &mut cookies,
            &ctx.auth_cookies,
            &ctx.secret,
            SetSessionCookieParams {
                session_token: &token,
                max_age_secs: Some((new_expires - Utc::now()).num_seconds()),
                dont_remember: false,
                cache,
            },
        );

        return Ok(GetSessionResult {
            response: Some(SessionResponse {
                session: refreshed.session.clone(),
                user: refreshed.user.clone(),
            }),
            cookies,
        });
    }

    Ok(GetSessionResult {
        response: Some(SessionResponse {
            session: filtered.session,
            user: filtered.user,
        }),
        cookies,
    })
}

// ─── listSessions / revoke ───────────────────────────────────────

/// Active (non-expired) sessions for the user.
pub async fn handle_list_sessions(
    ctx: &Arc<AuthContext>,
    user_id: &str,
    tenant: Option<&str>,
) -> Result<Vec<serde_json::Value>, AdapterError> {
    let sessions = ctx.adapter.list_sessions_for_user(user_id, tenant).await?;
    let now = Utc::now();
    Ok(sessions
        .into_iter()
        .filter(|s| {
            parse_datetime_field(s, "expiresAt")
                .map(|exp| exp > now)
                .unwrap_or(false)
        })
        .map(|s| filter_returned(&s, ctx.schema.get("session")))
        .collect())
}

/// Revoke one session by token. Only the owner may revoke it; foreign
/// tokens are ignored rather than leaked.
pub async fn handle_revoke_session(
    ctx: &Arc<AuthContext>,
    current_user_id: &str,
    token_to_revoke: &str,
    tenant: Option<&str>,
) -> Result<StatusResponse, AdapterError> {
    if let Some(su) = ctx
        .adapter
        .find_session_and_user(token_to_revoke, tenant)
        .await?
    {
        if su.session["userId"].as_str() == Some(current_user_id) {
            ctx.adapter.delete_session(token_to_revoke, tenant).await?;
        }
    }
    Ok(StatusResponse { status: true })
}

/// Revoke all of the user's sessions.
pub async fn handle_revoke_sessions(
    ctx: &Arc<AuthContext>,
    user_id: &str,
    tenant: Option<&str>,
) -> Result<StatusResponse, AdapterError> {
    ctx.adapter
        .delete_sessions_for_user(user_id, tenant, None)
        .await?;
    Ok(StatusResponse { status: true })
}

/// Revoke all sessions except the caller's current one.
pub async fn handle_revoke_other_sessions(
    ctx: &Arc<AuthContext>,
    user_id: &str,
    current_session_token: &str,
    tenant: Option<&str>,
) -> Result<StatusResponse, AdapterError> {
    ctx.adapter
        .delete_sessions_for_user(user_id, tenant, Some(current_session_token))
        .await?;
    Ok(StatusResponse { status: true })
}

// ─── Active organization / team pointers ─────────────────────────

/// Update the session's active-organization pointer and re-issue the session
/// cookie, since the cached payload is now stale.
pub async fn handle_set_active_organization(
    ctx: &Arc<AuthContext>,
    session_token: &str,
    organization_id: Option<&str>,
    tenant: Option<&str>,
    cookies: &mut ResponseCookies,
) -> Result<SessionResponse, AdapterError> {
    set_session_pointer(
        ctx,
        session_token,
        "activeOrganizationId",
        organization_id,
        tenant,
        cookies,
    )
    .await
}

/// Update the session's active-team pointer and re-issue the session cookie.
pub async fn handle_set_active_team(
    ctx: &Arc<AuthContext>,
    session_token: &str,
    team_id: Option<&str>,
    tenant: Option<&str>,
    cookies: &mut ResponseCookies,
) -> Result<SessionResponse, AdapterError> {
    set_session_pointer(ctx, session_token, "activeTeamId", team_id, tenant, cookies).await
}

async fn set_session_pointer(
    ctx: &Arc<AuthContext>,
    session_token: &str,
    field: &str,
    value: Option<&str>,
    tenant: Option<&str>,
    cookies: &mut ResponseCookies,
) -> Result<SessionResponse, AdapterError> {
    let update = serde_json::json!({
        field: value,
        "updatedAt": Utc::now().to_rfc3339(),
    });

    let session = ctx
        .adapter
        .update_session(session_token, update, tenant)
        .await?
        .ok_or(AdapterError::NotFound)?;

    let user_id = session["userId"]
        .as_str()
        .ok_or_else(|| AdapterError::Database("Session missing userId field".into()))?;
    let user = ctx
        .adapter
        .find_user_by_id(user_id)
        .await?
        .ok_or(AdapterError::NotFound)?;

    let filtered = filtered_session_user(ctx, &session, &user);
    let cache = ctx.session_config.cookie_cache_enabled.then(|| {
        (
            &filtered,
            ctx.session_config.cookie_cache_max_age,
            ctx.cookie_cache_config(),
        )
    });
    set_session_cookie(
        cookies,
        &ctx.auth_cookies,
        &ctx.secret,
        SetSessionCookieParams {
            session_token,
            max_age_secs: Some(remaining_max_age(&session, ctx.session_config.expires_in)),
            dont_remember: false,
            cache,
        },
    );

    Ok(SessionResponse {
        session: filtered.session.clone(),
        user: filtered.user.clone(),
    })
}

// ─── Helpers ─────────────────────────────────────────────────────

/// Strip non-returnable fields from the pair before it reaches a response
/// body or the cookie cache.
fn filtered_session_user(
    ctx: &AuthContext,
    session: &serde_json::Value,
    user: &serde_json::Value,
) -> SessionUser {
    SessionUser {
        session: filter_returned(session, ctx.schema.get("session")),
        user: filter_returned(user, ctx.schema.get("user")),
    }
}

fn parse_datetime_field(value: &serde_json::Value, field: &str) -> Option<DateTime<Utc>> {
    value[field]
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.to_utc())
}

/// Seconds until a session's expiry, for the cookie Max-Age. Falls back to
/// the configured expires_in when the row lacks a parseable expiry.
fn remaining_max_age(session: &serde_json::Value, expires_in: u64) -> i64 {
    parse_datetime_field(session, "expiresAt")
        .map(|exp| (exp - Utc::now()).num_seconds().max(0))
        .unwrap_or(expires_in as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_datetime_field_variants() {
        let val = serde_json::json!({"expiresAt": "2031-01-01T00:00:00Z"});
        assert!(parse_datetime_field(&val, "expiresAt").unwrap() > Utc::now());
        assert!(parse_datetime_field(&serde_json::json!({}), "expiresAt").is_none());
        assert!(
            parse_datetime_field(&serde_json::json!({"expiresAt": "garbage"}), "expiresAt")
                .is_none()
        );
    }

    #[test]
    fn session_freshness() {
        let fresh = serde_json::json!({"updatedAt": Utc::now().to_rfc3339()});
        assert!(is_session_fresh(&fresh, 300));

        let stale = serde_json::json!({
            "updatedAt": (Utc::now() - TimeDelta::seconds(600)).to_rfc3339(),
        });
        assert!(!is_session_fresh(&stale, 300));

        // Zero disables the check; a session with no timestamps never passes.
        assert!(is_session_fresh(&serde_json::json!({}), 0));
        assert!(!is_session_fresh(&serde_json::json!({}), 300));
    }

    #[test]
    fn remaining_max_age_clamps_to_zero() {
        let past = serde_json::json!({"expiresAt": "2001-01-01T00:00:00Z"});
        assert_eq!(remaining_max_age(&past, 3600), 0);

        let missing = serde_json::json!({});
        assert_eq!(remaining_max_age(&missing, 3600), 3600);
    }
}
