// Sign-in routes: email/password credential verification and the OAuth2
// kickoff (`POST /sign-in/oauth2`).

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::context::AuthContext;
use crate::cookies::ResponseCookies;
use crate::internal_adapter::{AdapterError, CreateSessionOptions};
use crate::oauth::state::{generate_state, StateData};
use crate::routes::session::issue_session;
use gatekit_core::error::{ApiError, ErrorCode};
use gatekit_oauth2::provider::AuthorizationUrlData;

// ─── Email/password ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInEmailRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub callback_url: Option<String>,
    /// false → dont-remember session (browser-session cookie, no renewal).
    #[serde(default)]
    pub remember_me: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInResponse {
    pub user: serde_json::Value,
    pub session: serde_json::Value,
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Typed error for sign-in handlers.
#[derive(Debug, thiserror::Error)]
pub enum SignInError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.'),
        None => false,
    }
}

/// Email/password sign-in.
///
/// Failures that reveal whether the email exists are collapsed into one
/// `INVALID_EMAIL_OR_PASSWORD` answer, and a dummy hash keeps the timing
/// comparable on the user-not-found path.
pub async fn handle_sign_in_email(
    ctx: &Arc<AuthContext>,
    body: SignInEmailRequest,
    headers: &HashMap<String, String>,
    cookies: &mut ResponseCookies,
) -> Result<SignInResponse, SignInError> {
    let ep = &ctx.options.email_and_password;
    if !ep.enabled {
        return Err(ApiError::bad_request(ErrorCode::InvalidEmailOrPassword).into());
    }

    if !is_plausible_email(&body.email) {
        return Err(ApiError::bad_request(ErrorCode::InvalidEmailOrPassword).into());
    }

    let user = match ctx.adapter.find_user_by_email(&body.email).await? {
        Some(u) => u,
        None => {
            let _ = crate::crypto::password::hash_password(&body.password);
            return Err(ApiError::unauthorized(ErrorCode::InvalidEmailOrPassword).into());
        }
    };

    let user_id = user["id"]
        .as_str()
        .ok_or(AdapterError::Database("User missing id field".into()))?
        .to_string();

    let accounts = ctx.adapter.find_accounts_by_user_id(&user_id).await?;
    let credential = accounts
        .iter()
        .find(|a| a["providerId"].as_str() == Some("credential"));

    let stored_hash = credential.and_then(|a| a["password"].as_str());
    let Some(stored_hash) = stored_hash else {
        let _ = crate::crypto::password::hash_password(&body.password);
        return Err(ApiError::unauthorized(ErrorCode::InvalidEmailOrPassword).into());
    };

    let valid = crate::crypto::password::verify_password(stored_hash, &body.password)
        .map_err(|e| AdapterError::Database(e.to_string()))?;
    if !valid {
        return Err(ApiError::unauthorized(ErrorCode::InvalidEmailOrPassword).into());
    }

    let dont_remember = body.remember_me == Some(false);
    let session = issue_session(
        ctx,
        &user_id,
        &user,
        CreateSessionOptions {
            dont_remember,
            ip_address: headers.get("x-forwarded-for").cloned(),
            user_agent: headers.get("user-agent").cloned(),
            tenant_id: ctx.tenant_from_headers(headers),
            overrides: None,
        },
        cookies,
    )
    .await?;

    let token = session["token"].as_str().unwrap_or_default().to_string();

    Ok(SignInResponse {
        user: gatekit_core::db::schema::filter_returned(&user, ctx.schema.get("user")),
        session,
        token,
        redirect: body.callback_url.as_ref().map(|_| true),
        url: body.callback_url,
    })
}

// ─── OAuth2 kickoff ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInOAuth2Request {
    pub provider_id: String,
    pub callback_url: String,
    #[serde(default)]
    pub error_callback_url: Option<String>,
    #[serde(default)]
    pub new_user_callback_url: Option<String>,
    #[serde(default)]
    pub scopes: Option<Vec<String>>,
    #[serde(default)]
    pub request_sign_up: Option<bool>,
    #[serde(default)]
    pub login_hint: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SignInOAuth2Response {
    pub url: String,
    pub redirect: bool,
}

/// Start a "login with provider" flow: persist the state, derive the PKCE
/// pair, and hand back the provider's authorization URL.
pub async fn handle_sign_in_oauth2(
    ctx: &Arc<AuthContext>,
    body: SignInOAuth2Request,
) -> Result<SignInOAuth2Response, SignInError> {
    let provider = ctx
        .oauth_providers
        .get(&body.provider_id)
        .ok_or_else(|| ApiError::not_found(ErrorCode::ProviderNotFound))?
        .clone();

    // Every redirect target must be ours before we hand it to the state.
    if !ctx.is_trusted_origin(&body.callback_url, true) {
        return Err(ApiError::bad_request(ErrorCode::InvalidCallbackUrl).into());
    }
    if let Some(error_url) = &body.error_callback_url {
        if !ctx.is_trusted_origin(error_url, true) {
            return Err(ApiError::bad_request(ErrorCode::InvalidErrorCallbackUrl).into());
        }
    }
    if let Some(new_user_url) = &body.new_user_callback_url {
        if !ctx.is_trusted_origin(new_user_url, true) {
            return Err(ApiError::bad_request(ErrorCode::InvalidNewUserCallbackUrl).into());
        }
    }

    let code_verifier = gatekit_oauth2::generate_code_verifier();

    let state = generate_state(
        ctx,
        StateData {
            provider_id: body.provider_id.clone(),
            callback_url: body.callback_url,
            error_url: body.error_callback_url,
            new_user_url: body.new_user_callback_url,
            code_verifier: Some(code_verifier.clone()),
            request_sign_up: body.request_sign_up.unwrap_or(false),
            expires_at: 0,
            link: None,
        },
    )
    .await
    .map_err(|e| {
        ctx.logger.error(&format!("OAuth state generation failed: {e}"));
        ApiError::internal(ErrorCode::InternalServerError)
    })?;

    let redirect_uri = callback_route(ctx, &body.provider_id);
    let url = provider
        .create_authorization_url(&AuthorizationUrlData {
            state,
            code_verifier: Some(code_verifier),
            scopes: body.scopes,
            redirect_uri,
            login_hint: body.login_hint,
        })
        .map_err(|e| {
            ctx.logger.error(&format!("Authorization URL build failed: {e}"));
            ApiError::internal(ErrorCode::InternalServerError)
        })?;

    Ok(SignInOAuth2Response {
        url: url.to_string(),
        redirect: true,
    })
}

/// The callback route this instance registers at the provider.
pub fn callback_route(ctx: &AuthContext, provider_id: &str) -> String {
    format!(
        "{}{}/oauth2/callback/{}",
        ctx.base_url.as_deref().unwrap_or(""),
        ctx.base_path,
        provider_id,
    )
}
