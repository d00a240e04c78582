// Account endpoints: list linked accounts and fetch a provider access
// token, refreshing it lazily when the stored one has expired.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::context::AuthContext;
use crate::internal_adapter::AdapterError;
use crate::oauth::token_utils::{get_token, set_token};
use gatekit_core::db::schema::filter_returned;
use gatekit_core::error::{ApiError, ErrorCode};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetAccessTokenRequest {
    pub provider_id: String,
    /// Narrow to a specific account row when the user holds several.
    #[serde(default)]
    pub account_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetAccessTokenResponse {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token_expires_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
}

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

/// Linked accounts for the user, stripped of token material.
pub async fn handle_list_accounts(
    ctx: &Arc<AuthContext>,
    user_id: &str,
) -> Result<Vec<serde_json::Value>, AdapterError> {
    let accounts = ctx.adapter.find_accounts_by_user_id(user_id).await?;
    Ok(accounts
        .into_iter()
        .map(|mut account| {
            if let Some(obj) = account.as_object_mut() {
                obj.remove("accessToken");
                obj.remove("refreshToken");
                obj.remove("idToken");
            }
            filter_returned(&account, ctx.schema.get("account"))
        })
        .collect())
}

/// Fetch a provider access token for the caller. When the stored token has
/// passed its expiry and a refresh token exists, refresh at the provider
/// first and persist the new pair.
pub async fn handle_get_access_token(
    ctx: &Arc<AuthContext>,
    user_id: &str,
    body: GetAccessTokenRequest,
) -> Result<GetAccessTokenResponse, AccountError> {
    let accounts = ctx.adapter.find_accounts_by_user_id(user_id).await?;
    let account = accounts
        .into_iter()
        .find(|a| {
            a["providerId"].as_str() == Some(body.provider_id.as_str())
                && body
                    .account_id
                    .as_deref()
                    .map(|id| a["accountId"].as_str() == Some(id))
                    .unwrap_or(true)
        })
        .ok_or_else(|| ApiError::not_found(ErrorCode::AccountNotFound))?;

    let expired = account["accessTokenExpiresAt"]
        .as_str()
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|exp| exp < Utc::now())
        .unwrap_or(false);

    let stored_access = get_token(ctx, account["accessToken"].as_str());

    if !expired {
        if let Some(access_token) = stored_access {
            return Ok(GetAccessTokenResponse {
                access_token,
                access_token_expires_at: account["accessTokenExpiresAt"]
                    .as_str()
                    .map(String::from),
                scopes: account["scope"]
                    .as_str()
                    .map(|s| s.split(' ').map(String::from).collect()),
            });
        }
    }

    // Lazy refresh path.
    let refresh_token = get_token(ctx, account["refreshToken"].as_str())
        .ok_or_else(|| ApiError::bad_request(ErrorCode::CouldNotRefreshAccessToken))?;

    let provider = ctx
        .oauth_providers
        .get(&body.provider_id)
        .ok_or_else(|| ApiError::not_found(ErrorCode::ProviderNotFound))?;

    let tokens = provider
        .refresh_access_token(&refresh_token)
        .await
        .map_err(|e| {
            ctx.logger
                .error(&format!("Token refresh with {} failed: {e}", body.provider_id));
            ApiError::bad_gateway(ErrorCode::CouldNotRefreshAccessToken)
        })?;

    let access_token = tokens
        .access_token
        .clone()
        .ok_or_else(|| ApiError::bad_gateway(ErrorCode::CouldNotRefreshAccessToken))?;

    if let Some(account_row_id) = account["id"].as_str() {
        let update = serde_json::json!({
            "accessToken": set_token(ctx, Some(&access_token)),
            "refreshToken": set_token(
                ctx,
                tokens.refresh_token.as_deref().or(Some(refresh_token.as_str())),
            ),
            "accessTokenExpiresAt": tokens.access_token_expires_at.map(|dt| dt.to_rfc3339()),
            "updatedAt": Utc::now().to_rfc3339(),
        });
        ctx.adapter.update_account_by_id(account_row_id, update).await?;
    }

    Ok(GetAccessTokenResponse {
        access_token,
        access_token_expires_at: tokens.access_token_expires_at.map(|dt| dt.to_rfc3339()),
        scopes: if tokens.scopes.is_empty() {
            account["scope"]
                .as_str()
                .map(|s| s.split(' ').map(String::from).collect())
        } else {
            Some(tokens.scopes)
        },
    })
}
