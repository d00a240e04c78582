// Account resolution during the OAuth callback: find the linked account,
// auto-link to an existing user when policy allows, or create the
// user+account pair.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use crate::context::AuthContext;
use crate::internal_adapter::AdapterError;
use crate::oauth::token_utils::set_token;
use gatekit_oauth2::{OAuth2Tokens, OAuth2UserInfo};

/// Policy inputs for the link/create decision.
#[derive(Debug, Clone, Default)]
pub struct LinkAccountOptions {
    /// Caller explicitly requested sign-up (from the state data).
    pub request_sign_up: bool,
    /// Provider requires an explicit sign-up request for new users.
    pub disable_implicit_sign_up: bool,
    /// Provider refuses to create users at all.
    pub disable_sign_up: bool,
    /// Refresh stored profile fields from the provider on this sign-in.
    pub override_user_info: bool,
}

/// Outcome of account resolution.
#[derive(Debug)]
pub enum OAuthCallbackOutcome {
    /// The user the session should be issued for.
    Success { user: Value, is_new_user: bool },
    /// New-user flow blocked by sign-up policy.
    SignupDisabled,
    /// An existing user matched by email, but the provider is not trusted
    /// for auto-linking.
    AccountNotLinked,
}

/// Serialize token fields for the account row, encrypting when configured.
fn account_token_fields(ctx: &AuthContext, tokens: &OAuth2Tokens) -> Value {
    serde_json::json!({
        "accessToken": set_token(ctx, tokens.access_token.as_deref()),
        "refreshToken": set_token(ctx, tokens.refresh_token.as_deref()),
        "idToken": tokens.id_token,
        "accessTokenExpiresAt": tokens.access_token_expires_at.map(|dt| dt.to_rfc3339()),
        "refreshTokenExpiresAt": tokens.refresh_token_expires_at.map(|dt| dt.to_rfc3339()),
        "scope": if tokens.scopes.is_empty() { None } else { Some(tokens.scopes.join(" ")) },
    })
}

/// Resolve the `(provider, subject)` pair to a user, per the account-linking
/// policy:
///
/// 1. Existing account → refresh stored tokens, use its user.
/// 2. Existing user with the same email → link, but only for providers in
///    the trusted-providers allow-list.
/// 3. No user → create user + account, unless sign-up policy forbids it.
pub async fn handle_oauth_user_info(
    ctx: &Arc<AuthContext>,
    provider_id: &str,
    user_info: &OAuth2UserInfo,
    tokens: &OAuth2Tokens,
    opts: LinkAccountOptions,
) -> Result<OAuthCallbackOutcome, AdapterError> {
    // 1. Already linked?
    if let Some(account) = ctx
        .adapter
        .find_account_by_provider(provider_id, &user_info.id)
        .await?
    {
        let user_id = account["userId"]
            .as_str()
            .ok_or_else(|| AdapterError::Database("Account missing userId field".into()))?
            .to_string();

        if ctx.options.account.update_account_on_sign_in {
            if let Some(account_row_id) = account["id"].as_str() {
                ctx.adapter
                    .update_account_by_id(account_row_id, account_token_fields(ctx, tokens))
                    .await?;
            }
        }

        let mut user = ctx
            .adapter
            .find_user_by_id(&user_id)
            .await?
            .ok_or(AdapterError::NotFound)?;

        if opts.override_user_info {
            user = ctx
                .adapter
                .update_user(&user_id, profile_update(user_info))
                .await?;
        } else if user_info.email_verified && user["emailVerified"].as_bool() != Some(true) {
            // The provider vouches for the address the user signed up with.
            if user["email"].as_str() == user_info.email.as_deref() {
                user = ctx
                    .adapter
                    .update_user(&user_id, serde_json::json!({"emailVerified": true}))
                    .await?;
            }
        }

        return Ok(OAuthCallbackOutcome::Success {
            user,
            is_new_user: false,
        });
    }

    // 2. Existing user with this email?
    if let Some(email) = user_info.email.as_deref() {
        if let Some(user) = ctx.adapter.find_user_by_email(email).await? {
            let linking = &ctx.options.account.account_linking;
            let trusted =
                linking.enabled && linking.trusted_providers.iter().any(|p| p == provider_id);
            if !trusted {
                return Ok(OAuthCallbackOutcome::AccountNotLinked);
            }

            let mut account_data = account_token_fields(ctx, tokens);
            if let Some(obj) = account_data.as_object_mut() {
                obj.insert("providerId".into(), Value::String(provider_id.to_string()));
                obj.insert("accountId".into(), Value::String(user_info.id.clone()));
                obj.insert("userId".into(), user["id"].clone());
            }
            ctx.adapter.link_account(account_data).await?;

            return Ok(OAuthCallbackOutcome::Success {
                user,
                is_new_user: false,
            });
        }
    }

    // 3. New-user flow.
    if opts.disable_sign_up || (opts.disable_implicit_sign_up && !opts.request_sign_up) {
        return Ok(OAuthCallbackOutcome::SignupDisabled);
    }

    let now = Utc::now().to_rfc3339();
    let user_data = serde_json::json!({
        "email": user_info.email.clone().unwrap_or_default(),
        "name": user_info.name.clone().unwrap_or_default(),
        "image": user_info.image.clone(),
        "emailVerified": user_info.email_verified,
        "createdAt": now,
        "updatedAt": now,
    });

    let mut account_data = account_token_fields(ctx, tokens);
    if let Some(obj) = account_data.as_object_mut() {
        obj.insert("providerId".into(), Value::String(provider_id.to_string()));
        obj.insert("accountId".into(), Value::String(user_info.id.clone()));
    }

    let user = ctx.adapter.create_oauth_user(user_data, account_data).await?;

    Ok(OAuthCallbackOutcome::Success {
        user,
        is_new_user: true,
    })
}

fn profile_update(user_info: &OAuth2UserInfo) -> Value {
    let mut update = serde_json::Map::new();
    if let Some(email) = &user_info.email {
        update.insert("email".into(), Value::String(email.to_lowercase()));
        update.insert("emailVerified".into(), Value::Bool(user_info.email_verified));
    }
    if let Some(name) = &user_info.name {
        update.insert("name".into(), Value::String(name.clone()));
    }
    if let Some(image) = &user_info.image {
        update.insert("image".into(), Value::String(image.clone()));
    }
    Value::Object(update)
}
