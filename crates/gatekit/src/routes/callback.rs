// OAuth provider callback (`GET /oauth2/callback/:providerId`).
//
// Browser-facing: every failure ends in a redirect carrying ?error=<code>,
// never a rendered exception. The state machine here is
// CALLBACK_RECEIVED → TOKEN_EXCHANGED → PROFILE_FETCHED →
// ACCOUNT_LINKED/CREATED → SESSION_ISSUED.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;

use crate::context::AuthContext;
use crate::cookies::ResponseCookies;
use crate::internal_adapter::{AdapterError, CreateSessionOptions};
use crate::oauth::link_account::{handle_oauth_user_info, LinkAccountOptions, OAuthCallbackOutcome};
use crate::oauth::state::parse_state;
use crate::oauth::token_utils::set_token;
use crate::routes::session::issue_session;
use crate::routes::sign_in::callback_route;
use gatekit_oauth2::provider::CodeValidationData;

/// Callback query/body parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Result of the callback: where to send the user-agent, plus cookies.
#[derive(Debug)]
pub struct CallbackResult {
    pub location: String,
    pub cookies: ResponseCookies,
}

fn append_error(base_url: &str, error: &str) -> String {
    let sep = if base_url.contains('?') { "&" } else { "?" };
    format!("{base_url}{sep}error={}", urlencoding::encode(error))
}

/// Bounce a form_post callback to GET, preserving params in the query
/// string so Set-Cookie works reliably on the redirect response.
pub fn handle_callback_post(
    ctx: &AuthContext,
    provider_id: &str,
    body: &CallbackQuery,
    query: &CallbackQuery,
) -> String {
    // Query wins over body on conflicts.
    let merged = CallbackQuery {
        code: query.code.clone().or_else(|| body.code.clone()),
        state: query.state.clone().or_else(|| body.state.clone()),
        error: query.error.clone().or_else(|| body.error.clone()),
        error_description: query
            .error_description
            .clone()
            .or_else(|| body.error_description.clone()),
    };

    let mut params = Vec::new();
    for (key, value) in [
        ("code", &merged.code),
        ("state", &merged.state),
        ("error", &merged.error),
        ("error_description", &merged.error_description),
    ] {
        if let Some(v) = value {
            params.push(format!("{key}={}", urlencoding::encode(v)));
        }
    }

    format!("{}?{}", callback_route(ctx, provider_id), params.join("&"))
}

/// Handle the provider redirect.
pub async fn handle_callback(
    ctx: &Arc<AuthContext>,
    provider_id: &str,
    query: CallbackQuery,
    headers: &HashMap<String, String>,
) -> Result<CallbackResult, AdapterError> {
    let cookies = ResponseCookies::new();
    let default_error_url = format!("{}/error", ctx.base_url.as_deref().unwrap_or(""));

    let error_redirect = |url: &str, code: &str| CallbackResult {
        location: append_error(url, code),
        cookies: ResponseCookies::new(),
    };

    // Provider-reported error: no state to consume yet.
    if let Some(error) = &query.error {
        ctx.logger
            .info(&format!("OAuth callback error from {provider_id}: {error}"));
        return Ok(error_redirect(&default_error_url, error));
    }

    // State is mandatory and single-use; consuming it here closes the
    // replay window before any other work happens.
    let Some(state_value) = query.state.as_deref() else {
        return Ok(error_redirect(&default_error_url, "state_not_found"));
    };
    let state = match parse_state(ctx, state_value).await {
        Ok(state) => state,
        Err(e) => {
            ctx.logger.info(&format!("OAuth state rejected: {e}"));
            return Ok(error_redirect(&default_error_url, &e.code.to_string()));
        }
    };

    let error_url = state
        .error_url
        .clone()
        .unwrap_or_else(|| default_error_url.clone());

    if state.provider_id != provider_id {
        return Ok(error_redirect(&error_url, "state_mismatch"));
    }

    let Some(code) = query.code.as_deref() else {
        return Ok(error_redirect(&error_url, "no_code"));
    };

    let Some(provider) = ctx.oauth_providers.get(provider_id).cloned() else {
        return Ok(error_redirect(&error_url, "provider_not_found"));
    };

    // TOKEN_EXCHANGED
    let tokens = match provider
        .validate_authorization_code(&CodeValidationData {
            code: code.to_string(),
            redirect_uri: callback_route(ctx, provider_id),
            code_verifier: state.code_verifier.clone(),
        })
        .await
    {
        Ok(tokens) => tokens,
        Err(e) => {
            // Upstream bodies stay in the server log; the browser sees a code.
            ctx.logger.error(&format!("Token exchange with {provider_id} failed: {e}"));
            return Ok(error_redirect(&error_url, &e.redirect_code()));
        }
    };

    // PROFILE_FETCHED
    let user_info = match provider.get_user_info(&tokens).await {
        Ok(info) => info,
        Err(e) => {
            ctx.logger.error(&format!("Userinfo fetch from {provider_id} failed: {e}"));
            return Ok(error_redirect(&error_url, &e.redirect_code()));
        }
    };

    // Link flow: attach the account to an already signed-in user.
    if let Some(link) = &state.link {
        let existing = ctx
            .adapter
            .find_account_by_provider(provider_id, &user_info.id)
            .await?;
        if let Some(account) = existing {
            if account["userId"].as_str() != Some(link.user_id.as_str()) {
                return Ok(error_redirect(&error_url, "account_already_linked"));
            }
        } else {
            let account_data = serde_json::json!({
                "providerId": provider_id,
                "accountId": user_info.id,
                "userId": link.user_id,
                "accessToken": set_token(ctx, tokens.access_token.as_deref()),
                "refreshToken": set_token(ctx, tokens.refresh_token.as_deref()),
                "idToken": tokens.id_token,
                "scope": if tokens.scopes.is_empty() { None } else { Some(tokens.scopes.join(" ")) },
            });
            ctx.adapter.link_account(account_data).await?;
        }
        return Ok(CallbackResult {
            location: state.callback_url,
            cookies,
        });
    }

    // ACCOUNT_LINKED/CREATED
    let outcome = handle_oauth_user_info(
        ctx,
        provider_id,
        &user_info,
        &tokens,
        LinkAccountOptions {
            request_sign_up: state.request_sign_up,
            disable_implicit_sign_up: provider.disable_implicit_sign_up(),
            disable_sign_up: provider.disable_sign_up(),
            override_user_info: provider.options().override_user_info,
        },
    )
    .await?;

    let (user, is_new_user) = match outcome {
        OAuthCallbackOutcome::Success { user, is_new_user } => (user, is_new_user),
        OAuthCallbackOutcome::SignupDisabled => {
            return Ok(error_redirect(&error_url, "signup_disabled"));
        }
        OAuthCallbackOutcome::AccountNotLinked => {
            return Ok(error_redirect(&error_url, "account_not_linked"));
        }
    };

    // SESSION_ISSUED
    let user_id = user["id"]
        .as_str()
        .ok_or_else(|| AdapterError::Database("User missing id field".into()))?
        .to_string();

    let mut cookies = cookies;
    issue_session(
        ctx,
        &user_id,
        &user,
        CreateSessionOptions {
            dont_remember: false,
            ip_address: headers.get("x-forwarded-for").cloned(),
            user_agent: headers.get("user-agent").cloned(),
            tenant_id: ctx.tenant_from_headers(headers),
            overrides: None,
        },
        &mut cookies,
    )
    .await?;

    let location = if is_new_user {
        state
            .new_user_url
            .clone()
            .unwrap_or_else(|| state.callback_url.clone())
    } else {
        state.callback_url.clone()
    };

    Ok(CallbackResult { location, cookies })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_error_handles_existing_query() {
        assert_eq!(append_error("/error", "no_code"), "/error?error=no_code");
        assert_eq!(
            append_error("/error?from=x", "no_code"),
            "/error?from=x&error=no_code"
        );
    }
}
