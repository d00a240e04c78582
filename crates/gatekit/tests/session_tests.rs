// Session engine integration tests: expiry invariant, rolling renewal and
// its throttle, cookie-cache fast path and bypass, dont-remember handling,
// tenant isolation, and revocation.

mod common;

use std::sync::Arc;

use chrono::{TimeDelta, Utc};

use common::*;
use gatekit::cookies::ResponseCookies;
use gatekit::internal_adapter::CreateSessionOptions;
use gatekit::routes::session::{
    handle_get_session, handle_list_sessions, handle_revoke_other_sessions,
    handle_revoke_session, handle_revoke_sessions, handle_set_active_organization,
    issue_session, GetSessionQuery,
};
use gatekit_core::db::adapter::{Adapter, WhereClause};
use gatekit_core::options::AuthOptions;

async fn seed_user(harness: &TestHarness, email: &str) -> String {
    let user = harness
        .ctx
        .adapter
        .create_user(serde_json::json!({
            "name": "Test User",
            "email": email,
            "emailVerified": true,
        }))
        .await
        .unwrap();
    user["id"].as_str().unwrap().to_string()
}

async fn seed_session(harness: &TestHarness, user_id: &str) -> String {
    let session = harness
        .ctx
        .adapter
        .create_session(
            user_id,
            CreateSessionOptions::default(),
            harness.ctx.session_config.expires_in as i64,
        )
        .await
        .unwrap();
    session["token"].as_str().unwrap().to_string()
}

/// Overwrite a session row's expiresAt, simulating the passage of time.
async fn rewind_expiry(harness: &TestHarness, token: &str, expires_at: chrono::DateTime<Utc>) {
    harness
        .store
        .update(
            "session",
            &[WhereClause::eq("token", token)],
            serde_json::json!({"expiresAt": expires_at.to_rfc3339()}),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn get_session_resolves_valid_session() {
    let harness = harness();
    let user_id = seed_user(&harness, "a@test.dev").await;
    let token = seed_session(&harness, &user_id).await;

    let result = handle_get_session(
        &harness.ctx,
        &session_cookie_header(&harness.ctx, &token),
        &no_headers(),
        GetSessionQuery::default(),
    )
    .await
    .unwrap();

    let response = result.response.expect("session should resolve");
    assert_eq!(response.user["email"], "a@test.dev");
    assert_eq!(response.session["userId"], user_id.as_str());
}

#[tokio::test]
async fn missing_or_tampered_cookie_is_unauthenticated() {
    let harness = harness();

    let no_cookie = handle_get_session(&harness.ctx, "", &no_headers(), GetSessionQuery::default())
        .await
        .unwrap();
    assert!(no_cookie.response.is_none());

    // A token signed with the wrong secret must not resolve.
    let forged = gatekit::cookies::sign_cookie_value("stolen-token", "attacker-secret").unwrap();
    let header = format!("{}={}", harness.ctx.auth_cookies.session_token.name, forged);
    let result = handle_get_session(&harness.ctx, &header, &no_headers(), GetSessionQuery::default())
        .await
        .unwrap();
    assert!(result.response.is_none());
}

#[tokio::test]
async fn expired_session_is_cleaned_up_on_read() {
    let harness = harness();
    let user_id = seed_user(&harness, "b@test.dev").await;
    let token = seed_session(&harness, &user_id).await;
    rewind_expiry(&harness, &token, Utc::now() - TimeDelta::seconds(5)).await;

    let result = handle_get_session(
        &harness.ctx,
        &session_cookie_header(&harness.ctx, &token),
        &no_headers(),
        GetSessionQuery::default(),
    )
    .await
    .unwrap();

    assert!(result.response.is_none());
    // The stale row was deleted and the cookie expired.
    assert_eq!(harness.store.model_count("session").await, 0);
    assert!(result
        .cookies
        .headers()
        .iter()
        .any(|(_, h)| h.contains("Max-Age=0")));
}

#[tokio::test]
async fn renewal_only_after_update_age_threshold() {
    let mut options = AuthOptions::default();
    options.session.expires_in = 3600;
    options.session.update_age = 600;
    let harness = harness_with(options);
    let user_id = seed_user(&harness, "c@test.dev").await;
    let token = seed_session(&harness, &user_id).await;

    // Fresh session: dueToBeUpdatedAt is ~10 minutes in, so no write yet.
    let before = handle_get_session(
        &harness.ctx,
        &session_cookie_header(&harness.ctx, &token),
        &no_headers(),
        GetSessionQuery::default(),
    )
    .await
    .unwrap();
    let first_expiry = before.response.unwrap().session["expiresAt"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(before.cookies.is_empty(), "no renewal before the threshold");

    // Simulate 3100s elapsed: expiresAt is now 500s short of a full window,
    // past dueToBeUpdatedAt = expiresAt - 3600 + 600.
    rewind_expiry(&harness, &token, Utc::now() + TimeDelta::seconds(3600 - 3100)).await;

    let after = handle_get_session(
        &harness.ctx,
        &session_cookie_header(&harness.ctx, &token),
        &no_headers(),
        GetSessionQuery::default(),
    )
    .await
    .unwrap();
    let renewed = after.response.unwrap();
    let renewed_expiry = renewed.session["expiresAt"].as_str().unwrap();
    assert_ne!(renewed_expiry, first_expiry);

    let parsed = chrono::DateTime::parse_from_rfc3339(renewed_expiry).unwrap();
    let delta = (parsed.to_utc() - Utc::now()).num_seconds();
    assert!((3590..=3600).contains(&delta), "extended to now + expiresIn");

    // The renewed cookie was re-signed with the new max-age.
    assert!(after
        .cookies
        .headers()
        .iter()
        .any(|(name, _)| name.contains("session_token")));
}

#[tokio::test]
async fn renewal_racing_deletion_invalidates() {
    let mut options = AuthOptions::default();
    options.session.expires_in = 3600;
    options.session.update_age = 600;
    let harness = harness_with(options);
    let user_id = seed_user(&harness, "d@test.dev").await;
    let token = seed_session(&harness, &user_id).await;
    rewind_expiry(&harness, &token, Utc::now() + TimeDelta::seconds(100)).await;

    // Concurrent revocation wins the race: the row is gone before the
    // renewal write happens.
    harness
        .ctx
        .adapter
        .delete_session(&token, None)
        .await
        .unwrap();

    let result = handle_get_session(
        &harness.ctx,
        &session_cookie_header(&harness.ctx, &token),
        &no_headers(),
        GetSessionQuery::default(),
    )
    .await
    .unwrap();
    assert!(result.response.is_none());
}

#[tokio::test]
async fn dont_remember_marker_suppresses_renewal() {
    let mut options = AuthOptions::default();
    options.session.expires_in = 3600;
    options.session.update_age = 600;
    let harness = harness_with(options);
    let user_id = seed_user(&harness, "e@test.dev").await;
    let token = seed_session(&harness, &user_id).await;

    // Session is past the renewal threshold...
    rewind_expiry(&harness, &token, Utc::now() + TimeDelta::seconds(100)).await;

    // ...but the dont_remember marker is present.
    let marker = gatekit::cookies::sign_cookie_value("true", SECRET).unwrap();
    let header = format!(
        "{}; {}={}",
        session_cookie_header(&harness.ctx, &token),
        harness.ctx.auth_cookies.dont_remember.name,
        marker,
    );

    let result = handle_get_session(&harness.ctx, &header, &no_headers(), GetSessionQuery::default())
        .await
        .unwrap();
    let response = result.response.expect("session still valid");

    // expiresAt unchanged: renewal suppressed.
    let expiry = chrono::DateTime::parse_from_rfc3339(
        response.session["expiresAt"].as_str().unwrap(),
    )
    .unwrap();
    assert!((expiry.to_utc() - Utc::now()).num_seconds() <= 100);
}

#[tokio::test]
async fn cookie_cache_fast_path_skips_the_store() {
    let mut options = AuthOptions::default();
    options.session.cookie_cache.enabled = true;
    let harness = harness_with(options);
    let user_id = seed_user(&harness, "f@test.dev").await;

    // Sign in through issue_session so the cache cookie gets written.
    let user = harness.ctx.adapter.find_user_by_id(&user_id).await.unwrap().unwrap();
    let mut cookies = ResponseCookies::new();
    issue_session(
        &harness.ctx,
        &user_id,
        &user,
        CreateSessionOptions::default(),
        &mut cookies,
    )
    .await
    .unwrap();
    let browser_cookies = cookies_to_header(&cookies);

    // Delete every session row: only the cache can answer now.
    harness
        .store
        .delete_many("session", &[])
        .await
        .unwrap();

    let cached = handle_get_session(
        &harness.ctx,
        &browser_cookies,
        &no_headers(),
        GetSessionQuery::default(),
    )
    .await
    .unwrap();
    assert!(
        cached.response.is_some(),
        "cache hit answers without a store round trip"
    );

    // Bypassing the cache reaches the store and finds nothing.
    let bypassed = handle_get_session(
        &harness.ctx,
        &browser_cookies,
        &no_headers(),
        GetSessionQuery {
            disable_cookie_cache: true,
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert!(bypassed.response.is_none());
}

#[tokio::test]
async fn cookie_cache_strips_non_returnable_fields() {
    let mut options = AuthOptions::default();
    options.session.cookie_cache.enabled = true;
    let harness = harness_with(options);
    let user_id = seed_user(&harness, "g@test.dev").await;

    let mut user = harness.ctx.adapter.find_user_by_id(&user_id).await.unwrap().unwrap();
    // A credential hash must never reach the client-side cache.
    user["password"] = serde_json::json!("salt:hash");

    let mut cookies = ResponseCookies::new();
    issue_session(
        &harness.ctx,
        &user_id,
        &user,
        CreateSessionOptions::default(),
        &mut cookies,
    )
    .await
    .unwrap();

    let cached = gatekit::cookies::get_cookie_cache(
        &cookies_to_header(&cookies),
        &harness.ctx.auth_cookies,
        SECRET,
        &harness.ctx.cookie_cache_config(),
    )
    .expect("cache cookie present");
    assert!(cached.user.get("password").is_none());
}

#[tokio::test]
async fn tenant_isolation_on_session_reads() {
    let mut options = AuthOptions::default();
    options.tenancy.enabled = true;
    let harness = harness_with(options);
    let user_id = seed_user(&harness, "h@tenant1.test").await;

    let session = harness
        .ctx
        .adapter
        .create_session(
            &user_id,
            CreateSessionOptions {
                tenant_id: Some("tenant-1".into()),
                ..Default::default()
            },
            3600,
        )
        .await
        .unwrap();
    let token = session["token"].as_str().unwrap().to_string();
    let cookie = session_cookie_header(&harness.ctx, &token);

    // Same token, right tenant → resolves.
    let own = handle_get_session(
        &harness.ctx,
        &cookie,
        &tenant_headers("tenant-1"),
        GetSessionQuery::default(),
    )
    .await
    .unwrap();
    assert!(own.response.is_some());

    // Same token, other tenant → behaves as not-found.
    let cross = handle_get_session(
        &harness.ctx,
        &cookie,
        &tenant_headers("tenant-2"),
        GetSessionQuery::default(),
    )
    .await
    .unwrap();
    assert!(cross.response.is_none());
}

#[tokio::test]
async fn list_and_revoke_sessions() {
    let harness = harness();
    let user_id = seed_user(&harness, "i@test.dev").await;
    let token_a = seed_session(&harness, &user_id).await;
    let token_b = seed_session(&harness, &user_id).await;
    let token_c = seed_session(&harness, &user_id).await;

    let listed = handle_list_sessions(&harness.ctx, &user_id, None).await.unwrap();
    assert_eq!(listed.len(), 3);

    // Revoke one.
    handle_revoke_session(&harness.ctx, &user_id, &token_a, None)
        .await
        .unwrap();
    assert_eq!(harness.store.model_count("session").await, 2);

    // A different user cannot revoke someone else's session.
    handle_revoke_session(&harness.ctx, "someone-else", &token_b, None)
        .await
        .unwrap();
    assert_eq!(harness.store.model_count("session").await, 2);

    // Revoke all but the current one.
    handle_revoke_other_sessions(&harness.ctx, &user_id, &token_c, None)
        .await
        .unwrap();
    let remaining = handle_list_sessions(&harness.ctx, &user_id, None).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0]["token"], token_c.as_str());

    // Revoke everything.
    handle_revoke_sessions(&harness.ctx, &user_id, None).await.unwrap();
    assert_eq!(harness.store.model_count("session").await, 0);
}

#[tokio::test]
async fn secondary_storage_serves_and_revokes_sessions() {
    use gatekit_core::db::secondary_storage::{MemorySecondaryStorage, SecondaryStorage};

    let secondary = Arc::new(MemorySecondaryStorage::new());
    let mut options = AuthOptions::default();
    options.secondary_storage = Some(secondary.clone());
    options.session.store_session_in_database = true;
    let harness = harness_with(options);

    let user_id = seed_user(&harness, "cache@test.dev").await;
    let token_a = seed_session(&harness, &user_id).await;
    let token_b = seed_session(&harness, &user_id).await;

    // The payload is cached under the token key.
    assert!(secondary.get(&format!("session:{token_a}")).await.is_some());

    // Resolution prefers the cache: wipe the primary rows, reads still hit.
    harness.store.delete_many("session", &[]).await.unwrap();
    let resolved = harness
        .ctx
        .adapter
        .find_session_and_user(&token_a, None)
        .await
        .unwrap();
    assert!(resolved.is_some());

    // Revoke-all drains the cache through the active-sessions list even
    // though the primary rows are gone.
    harness
        .ctx
        .adapter
        .delete_sessions_for_user(&user_id, None, None)
        .await
        .unwrap();
    assert!(secondary.get(&format!("session:{token_a}")).await.is_none());
    assert!(secondary.get(&format!("session:{token_b}")).await.is_none());
    assert!(secondary
        .get(&format!("active-sessions:{user_id}"))
        .await
        .is_none());
}

#[tokio::test]
async fn session_create_hooks_contribute_and_veto() {
    use async_trait::async_trait;
    use gatekit::context::AuthContextBuilder;
    use gatekit_core::hooks::{AsyncHook, HookEvent, HookResult};
    use gatekit_memory::MemoryAdapter;

    struct StampDevice;

    #[async_trait]
    impl AsyncHook for StampDevice {
        async fn on_event(&self, _event: HookEvent, data: &serde_json::Value) -> HookResult {
            let mut out = data.clone();
            out["session"] = serde_json::json!({"deviceLabel": "ci-runner"});
            HookResult::with_data(out)
        }
    }

    struct Veto;

    #[async_trait]
    impl AsyncHook for Veto {
        async fn on_event(&self, _event: HookEvent, _data: &serde_json::Value) -> HookResult {
            HookResult::cancel("blocked user")
        }
    }

    let mut options = AuthOptions::default();
    options.secret = SECRET.to_string();
    options.base_url = Some("http://app.test".into());
    let store = MemoryAdapter::new();
    let ctx = AuthContextBuilder::new(options, Arc::new(store.clone()))
        .hook(HookEvent::BeforeSessionCreate, Arc::new(StampDevice))
        .build();

    let user = ctx
        .adapter
        .create_user(serde_json::json!({"name": "H", "email": "hook@test.dev"}))
        .await
        .unwrap();
    let user_id = user["id"].as_str().unwrap();

    let mut cookies = ResponseCookies::new();
    let session = issue_session(&ctx, user_id, &user, Default::default(), &mut cookies)
        .await
        .unwrap();
    assert_eq!(session["deviceLabel"], "ci-runner");

    // A cancelling hook blocks issuance entirely.
    let mut options = AuthOptions::default();
    options.secret = SECRET.to_string();
    options.base_url = Some("http://app.test".into());
    let blocking_ctx = AuthContextBuilder::new(options, Arc::new(MemoryAdapter::new()))
        .hook(HookEvent::BeforeSessionCreate, Arc::new(Veto))
        .build();
    let result = issue_session(
        &blocking_ctx,
        user_id,
        &user,
        Default::default(),
        &mut ResponseCookies::new(),
    )
    .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn email_sign_in_verifies_credentials_and_issues_session() {
    use gatekit::routes::sign_in::{handle_sign_in_email, SignInEmailRequest};

    let mut options = AuthOptions::default();
    options.email_and_password.enabled = true;
    let harness = harness_with(options);
    let user_id = seed_user(&harness, "k@test.dev").await;

    // Credential account with a real scrypt hash.
    let hash = gatekit::crypto::password::hash_password("correct horse battery").unwrap();
    harness
        .ctx
        .adapter
        .link_account(serde_json::json!({
            "providerId": "credential",
            "accountId": user_id,
            "userId": user_id,
            "password": hash,
        }))
        .await
        .unwrap();

    let mut cookies = ResponseCookies::new();
    let response = handle_sign_in_email(
        &harness.ctx,
        SignInEmailRequest {
            email: "k@test.dev".into(),
            password: "correct horse battery".into(),
            callback_url: None,
            remember_me: None,
        },
        &no_headers(),
        &mut cookies,
    )
    .await
    .unwrap();

    assert!(!response.token.is_empty());
    assert!(response.token.len() >= 32);
    // Password material never leaves the engine.
    assert!(response.user.get("password").is_none());
    assert!(cookies
        .headers()
        .iter()
        .any(|(name, _)| name.contains("session_token")));

    // Wrong password: one collapsed error, no session issued.
    let mut cookies = ResponseCookies::new();
    let err = handle_sign_in_email(
        &harness.ctx,
        SignInEmailRequest {
            email: "k@test.dev".into(),
            password: "wrong".into(),
            callback_url: None,
            remember_me: None,
        },
        &no_headers(),
        &mut cookies,
    )
    .await;
    assert!(err.is_err());
    assert_eq!(harness.store.model_count("session").await, 1);

    // Unknown email: same collapsed error.
    let err = handle_sign_in_email(
        &harness.ctx,
        SignInEmailRequest {
            email: "ghost@test.dev".into(),
            password: "whatever".into(),
            callback_url: None,
            remember_me: None,
        },
        &no_headers(),
        &mut ResponseCookies::new(),
    )
    .await;
    assert!(err.is_err());
}

#[tokio::test]
async fn sign_out_revokes_and_clears_cookies() {
    use gatekit::routes::sign_out::handle_sign_out;

    let harness = harness();
    let user_id = seed_user(&harness, "l@test.dev").await;
    let token = seed_session(&harness, &user_id).await;

    let mut cookies = ResponseCookies::new();
    let response = handle_sign_out(
        &harness.ctx,
        &session_cookie_header(&harness.ctx, &token),
        &no_headers(),
        &mut cookies,
    )
    .await
    .unwrap();

    assert!(response.success);
    assert_eq!(harness.store.model_count("session").await, 0);
    assert!(cookies
        .headers()
        .iter()
        .all(|(_, header)| header.contains("Max-Age=0")));
}

#[tokio::test]
async fn set_active_organization_updates_pointer_and_reissues_cookie() {
    let mut options = AuthOptions::default();
    options.session.cookie_cache.enabled = true;
    let harness = harness_with(options);
    let user_id = seed_user(&harness, "j@test.dev").await;
    let token = seed_session(&harness, &user_id).await;

    let mut cookies = ResponseCookies::new();
    let response = handle_set_active_organization(
        &harness.ctx,
        &token,
        Some("org-42"),
        None,
        &mut cookies,
    )
    .await
    .unwrap();

    assert_eq!(response.session["activeOrganizationId"], "org-42");

    // The stale cache was replaced alongside the token cookie.
    let names: Vec<&str> = cookies.headers().iter().map(|(n, _)| n.as_str()).collect();
    assert!(names.iter().any(|n| n.contains("session_token")));
    assert!(names.iter().any(|n| n.contains("session_data")));

    // Pointer persisted.
    let row = harness
        .store
        .find_one("session", &[WhereClause::eq("token", token.as_str())])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row["activeOrganizationId"], "org-42");
}
