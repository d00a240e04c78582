// OpenID Provider plugin: discovery, dynamic client registration, the
// authorization endpoint (with login/consent redirects), the token endpoint
// (authorization_code + refresh_token), userinfo, and JWKS.
//
// Authorization codes are verification rows under `oidc:auth:{code}`,
// consumed with an atomic take at the token endpoint, so redeeming a code
// twice fails with invalid_grant no matter how the requests interleave.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::Value;

use crate::context::AuthContext;
use crate::plugins::jwt::SigningKeyProvider;
use gatekit_core::db::schema::{AuthTable, SchemaField};
use gatekit_core::plugin::{
    AuthPlugin, HttpMethod, PluginEndpoint, PluginHandlerFn, PluginHandlerRequest,
    PluginHandlerResponse, PluginInitContext, PluginRateLimit,
};
use gatekit_oauth_provider::consent::{build_consent, has_consent, strip_consent_prompt};
use gatekit_oauth_provider::discovery::build_oidc_metadata;
use gatekit_oauth_provider::grants::{
    validate_authorization_request, validate_code_redemption, validate_consent_scopes,
};
use gatekit_oauth_provider::token::{generate_authorization_code, mint_tokens};
use gatekit_oauth_provider::{
    AuthorizationRequest, CodeGrant, ConsentRecord, OAuthProviderError, OidcProviderOptions,
    RegisterClientResponse, RegisteredClient, TokenRequest,
};

const AUTH_CODE_PREFIX: &str = "oidc:auth:";
const LOGIN_PROMPT_PREFIX: &str = "oidc:prompt:";

// ---------------------------------------------------------------------------
// Plugin definition
// ---------------------------------------------------------------------------

pub struct OidcProviderPlugin {
    options: Arc<OidcProviderOptions>,
    signing_keys: Option<Arc<dyn SigningKeyProvider>>,
}

impl std::fmt::Debug for OidcProviderPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidcProviderPlugin")
            .field("options", &self.options)
            .field("asymmetric_signing", &self.signing_keys.is_some())
            .finish()
    }
}

impl OidcProviderPlugin {
    pub fn new(options: OidcProviderOptions) -> Self {
        Self {
            options: Arc::new(options),
            signing_keys: None,
        }
    }

    /// Attach a signing-key provider; ID tokens switch from the HS256
    /// fallback to asymmetric signing and `/jwks` publishes the public key.
    pub fn with_signing_keys(mut self, provider: Arc<dyn SigningKeyProvider>) -> Self {
        self.signing_keys = Some(provider);
        self
    }
}

impl Default for OidcProviderPlugin {
    fn default() -> Self {
        Self::new(OidcProviderOptions::default())
    }
}

#[async_trait::async_trait]
impl AuthPlugin for OidcProviderPlugin {
    fn id(&self) -> &str {
        "oidc-provider"
    }

    fn name(&self) -> &str {
        "OIDC Provider"
    }

    async fn init(&self, _ctx: &PluginInitContext<'_>) -> Result<(), gatekit_core::error::AuthError> {
        Ok(())
    }

    fn schema(&self) -> Vec<AuthTable> {
        vec![
            oauth_application_table(),
            oauth_access_token_table(),
            oauth_consent_table(),
        ]
    }

    fn endpoints(&self) -> Vec<PluginEndpoint> {
        let options = self.options.clone();
        let signing = self.signing_keys.clone();

        vec![
            PluginEndpoint::with_handler(
                "/.well-known/openid-configuration",
                HttpMethod::Get,
                false,
                discovery_handler(options.clone(), signing.is_some()),
            ),
            PluginEndpoint::with_handler(
                "/oauth2/register",
                HttpMethod::Post,
                false,
                register_handler(options.clone()),
            ),
            PluginEndpoint::with_handler(
                "/oauth2/authorize",
                HttpMethod::Get,
                false,
                authorize_handler(options.clone()),
            ),
            PluginEndpoint::with_handler(
                "/oauth2/consent",
                HttpMethod::Post,
                true,
                consent_handler(),
            ),
            PluginEndpoint::with_handler(
                "/oauth2/token",
                HttpMethod::Post,
                false,
                token_handler(options.clone(), signing.clone()),
            ),
            PluginEndpoint::with_handler(
                "/oauth2/userinfo",
                HttpMethod::Get,
                false,
                userinfo_handler(),
            ),
            PluginEndpoint::with_handler("/jwks", HttpMethod::Get, false, jwks_handler(signing)),
        ]
    }

    fn rate_limit(&self) -> Vec<PluginRateLimit> {
        vec![PluginRateLimit {
            path: "/oauth2".to_string(),
            window: 60,
            max: 100,
        }]
    }
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

pub fn oauth_application_table() -> AuthTable {
    AuthTable::new("oauthApplication")
        .field("id", SchemaField::required_string())
        .field("clientId", SchemaField::required_string().with_unique())
        .field("clientSecret", SchemaField::optional_string().hidden())
        .field("name", SchemaField::required_string())
        .field("icon", SchemaField::optional_string())
        .field("redirectUris", SchemaField::required_string())
        .field("clientType", SchemaField::required_string())
        .field("tokenEndpointAuthMethod", SchemaField::required_string())
        .field("disabled", SchemaField::boolean(false))
        .field("metadata", SchemaField::optional_string())
        .field("createdAt", SchemaField::created_at())
        .field("updatedAt", SchemaField::updated_at())
}

pub fn oauth_access_token_table() -> AuthTable {
    AuthTable::new("oauthAccessToken")
        .field("id", SchemaField::required_string())
        .field("accessToken", SchemaField::required_string().with_unique())
        .field("refreshToken", SchemaField::optional_string())
        .field("accessTokenExpiresAt", SchemaField::required_string())
        .field("refreshTokenExpiresAt", SchemaField::optional_string())
        .field("clientId", SchemaField::required_string())
        .field("userId", SchemaField::required_string().with_reference("user", "id"))
        .field("scopes", SchemaField::required_string())
        .field("createdAt", SchemaField::created_at())
        .field("updatedAt", SchemaField::updated_at())
}

pub fn oauth_consent_table() -> AuthTable {
    AuthTable::new("oauthConsent")
        .field("id", SchemaField::required_string())
        .field("clientId", SchemaField::required_string())
        .field("userId", SchemaField::required_string().with_reference("user", "id"))
        .field("scopes", SchemaField::required_string())
        .field("referenceId", SchemaField::optional_string())
        .field("createdAt", SchemaField::created_at())
        .field("updatedAt", SchemaField::updated_at())
}

// ---------------------------------------------------------------------------
// Client lookup
// ---------------------------------------------------------------------------

/// Look up a client: static trusted clients first, then the database.
async fn find_client(
    ctx: &AuthContext,
    options: &OidcProviderOptions,
    client_id: &str,
) -> Option<RegisteredClient> {
    if let Some(trusted) = options
        .trusted_clients
        .iter()
        .find(|c| c.client_id == client_id)
    {
        return Some(trusted.clone());
    }

    let row = ctx
        .adapter
        .find_one("oauthApplication", &[("clientId", Value::String(client_id.into()))])
        .await
        .ok()??;

    Some(RegisteredClient {
        id: row["id"].as_str().unwrap_or_default().to_string(),
        client_id: client_id.to_string(),
        client_secret: row["clientSecret"].as_str().map(String::from),
        name: row["name"].as_str().unwrap_or_default().to_string(),
        icon: row["icon"].as_str().map(String::from),
        redirect_uris: row["redirectUris"]
            .as_str()
            .map(|s| s.split(',').map(String::from).collect())
            .unwrap_or_default(),
        client_type: row["clientType"].as_str().unwrap_or("web").to_string(),
        token_endpoint_auth_method: row["tokenEndpointAuthMethod"]
            .as_str()
            .unwrap_or("client_secret_basic")
            .to_string(),
        disabled: row["disabled"].as_bool().unwrap_or(false),
        skip_consent: false,
        metadata: row.get("metadata").cloned(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    })
}

fn oauth_error(status: u16, error: &OAuthProviderError) -> PluginHandlerResponse {
    PluginHandlerResponse {
        status,
        body: serde_json::json!({
            "error": error.code(),
            "error_description": error.description(),
        }),
        headers: HashMap::new(),
        redirect: None,
    }
}

fn redirect_with_error(redirect_uri: &str, error: &OAuthProviderError, state: Option<&str>) -> PluginHandlerResponse {
    let sep = if redirect_uri.contains('?') { "&" } else { "?" };
    let mut url = format!("{redirect_uri}{sep}error={}", error.code());
    if let Some(state) = state {
        url.push_str(&format!("&state={}", urlencoding::encode(state)));
    }
    PluginHandlerResponse::redirect_to(url)
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

fn discovery_handler(options: Arc<OidcProviderOptions>, asymmetric: bool) -> PluginHandlerFn {
    Arc::new(move |ctx_any, _req: PluginHandlerRequest| {
        let options = options.clone();
        Box::pin(async move {
            let ctx = ctx_any
                .downcast::<AuthContext>()
                .expect("handler context is AuthContext");
            let issuer = format!(
                "{}{}",
                ctx.base_url.as_deref().unwrap_or(""),
                ctx.base_path
            );
            let metadata = build_oidc_metadata(&issuer, &options, asymmetric);
            PluginHandlerResponse::ok(serde_json::to_value(metadata).unwrap_or_default())
        })
    })
}

// ---------------------------------------------------------------------------
// Dynamic client registration
// ---------------------------------------------------------------------------

fn register_handler(options: Arc<OidcProviderOptions>) -> PluginHandlerFn {
    Arc::new(move |ctx_any, req: PluginHandlerRequest| {
        let options = options.clone();
        Box::pin(async move {
            let ctx = ctx_any
                .downcast::<AuthContext>()
                .expect("handler context is AuthContext");

            if !options.allow_dynamic_client_registration && req.session.is_none() {
                return oauth_error(401, &OAuthProviderError::InvalidClient);
            }

            let redirect_uris: Vec<String> = req.body["redirect_uris"]
                .as_array()
                .map(|arr| {
                    arr.iter()
                        .filter_map(|v| v.as_str().map(String::from))
                        .collect()
                })
                .unwrap_or_default();

            let grant_types: Vec<String> = req.body["grant_types"]
                .as_array()
                .map(|arr| {
                    arr.iter()
                        .filter_map(|v| v.as_str().map(String::from))
                        .collect()
                })
                .unwrap_or_else(|| vec!["authorization_code".into()]);

            let response_types: Vec<String> = req.body["response_types"]
                .as_array()
                .map(|arr| {
                    arr.iter()
                        .filter_map(|v| v.as_str().map(String::from))
                        .collect()
                })
                .unwrap_or_else(|| vec!["code".into()]);

            if grant_types.iter().any(|g| g == "authorization_code") {
                if redirect_uris.is_empty() {
                    return oauth_error(400, &OAuthProviderError::InvalidRequest);
                }
                if !response_types.iter().any(|r| r == "code") {
                    return oauth_error(400, &OAuthProviderError::InvalidRequest);
                }
            }

            let auth_method = req.body["token_endpoint_auth_method"]
                .as_str()
                .unwrap_or("client_secret_basic")
                .to_string();
            let has_secret = auth_method != "none";

            let client_id = crate::crypto::random::generate_random_string(32);
            let client_secret =
                has_secret.then(|| crate::crypto::random::generate_random_string(48));
            let now = Utc::now();

            let row = serde_json::json!({
                "clientId": client_id.clone(),
                "clientSecret": client_secret.clone(),
                "name": req.body["client_name"].as_str().unwrap_or("Unnamed client"),
                "icon": req.body["logo_uri"].as_str(),
                "redirectUris": redirect_uris.join(","),
                "clientType": "web",
                "tokenEndpointAuthMethod": auth_method,
                "disabled": false,
                "metadata": req.body.get("metadata").cloned().unwrap_or(Value::Null),
                "createdAt": now.to_rfc3339(),
                "updatedAt": now.to_rfc3339(),
            });

            if let Err(e) = ctx.adapter.create("oauthApplication", row).await {
                ctx.logger.error(&format!("Client registration write failed: {e}"));
                return oauth_error(500, &OAuthProviderError::ServerError);
            }

            let response = RegisterClientResponse {
                client_id,
                client_secret,
                client_id_issued_at: now.timestamp(),
                client_secret_expires_at: 0,
                redirect_uris,
                token_endpoint_auth_method: auth_method_of(&req.body),
                grant_types,
                response_types,
                client_name: req.body["client_name"].as_str().map(String::from),
                logo_uri: req.body["logo_uri"].as_str().map(String::from),
            };

            PluginHandlerResponse::created(serde_json::to_value(response).unwrap_or_default())
        })
    })
}

fn auth_method_of(body: &Value) -> String {
    body["token_endpoint_auth_method"]
        .as_str()
        .unwrap_or("client_secret_basic")
        .to_string()
}

// ---------------------------------------------------------------------------
// Authorization endpoint
// ---------------------------------------------------------------------------

fn parse_authorize_query(query: &Value) -> AuthorizationRequest {
    let get = |key: &str| query.get(key).and_then(|v| v.as_str()).map(String::from);
    AuthorizationRequest {
        response_type: get("response_type").unwrap_or_default(),
        client_id: get("client_id").unwrap_or_default(),
        redirect_uri: get("redirect_uri").unwrap_or_default(),
        scope: get("scope"),
        state: get("state"),
        code_challenge: get("code_challenge"),
        code_challenge_method: get("code_challenge_method"),
        prompt: get("prompt"),
        nonce: get("nonce"),
        max_age: get("max_age").and_then(|s| s.parse().ok()),
    }
}

/// Parse the prompt parameter. `none` must be alone.
fn parse_prompt(prompt: Option<&str>) -> Result<Vec<String>, OAuthProviderError> {
    let Some(prompt) = prompt else {
        return Ok(Vec::new());
    };
    let valid = ["login", "consent", "select_account", "none"];
    let prompts: Vec<String> = prompt
        .split_whitespace()
        .filter(|p| valid.contains(p))
        .map(String::from)
        .collect();
    if prompts.iter().any(|p| p == "none") && prompts.len() > 1 {
        return Err(OAuthProviderError::InvalidRequest);
    }
    Ok(prompts)
}

fn authorize_handler(options: Arc<OidcProviderOptions>) -> PluginHandlerFn {
    Arc::new(move |ctx_any, req: PluginHandlerRequest| {
        let options = options.clone();
        Box::pin(async move {
            let ctx = ctx_any
                .downcast::<AuthContext>()
                .expect("handler context is AuthContext");

            // A resumed flow carries oidc_prompt instead of the original
            // query; rehydrate (and consume) the parked request.
            let query = match req.query.get("oidc_prompt").and_then(|v| v.as_str()) {
                Some(prompt_code) => {
                    let parked = ctx
                        .adapter
                        .take_verification(&format!("{LOGIN_PROMPT_PREFIX}{prompt_code}"))
                        .await;
                    match parked {
                        Ok(Some(row)) => row["value"]
                            .as_str()
                            .and_then(|v| serde_json::from_str(v).ok())
                            .unwrap_or_else(|| req.query.clone()),
                        _ => return oauth_error(400, &OAuthProviderError::InvalidRequest),
                    }
                }
                None => req.query.clone(),
            };
            let request = parse_authorize_query(&query);

            // Client + redirect_uri come first; on failure the error is
            // rendered, never redirected.
            let Some(client) = find_client(&ctx, &options, &request.client_id).await else {
                return oauth_error(400, &OAuthProviderError::InvalidClient);
            };

            let scopes = match validate_authorization_request(&request, &client, &options) {
                Ok(scopes) => scopes,
                Err(
                    err @ (OAuthProviderError::InvalidRedirectUri
                    | OAuthProviderError::InvalidClient),
                ) => return oauth_error(400, &err),
                // The redirect_uri is registered at this point, so protocol
                // errors may redirect per RFC 6749 §4.1.2.1.
                Err(err) => {
                    return redirect_with_error(&request.redirect_uri, &err, request.state.as_deref())
                }
            };

            let prompts = match parse_prompt(request.prompt.as_deref()) {
                Ok(p) => p,
                Err(err) => {
                    return redirect_with_error(&request.redirect_uri, &err, request.state.as_deref())
                }
            };
            let prompt_none = prompts.iter().any(|p| p == "none");

            // Session check; max_age forces re-login for old sessions.
            let user_id = req
                .session
                .as_ref()
                .and_then(|s| s["user"]["id"].as_str())
                .map(String::from);

            let auth_time = req
                .session
                .as_ref()
                .and_then(|s| s["session"]["createdAt"].as_str())
                .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.timestamp());

            let mut require_login = prompts.iter().any(|p| p == "login");
            if let (Some(max_age), Some(created)) = (request.max_age, auth_time) {
                if max_age >= 0 && Utc::now().timestamp() - created > max_age {
                    require_login = true;
                }
            }

            let Some(user_id) = user_id.filter(|_| !require_login) else {
                if prompt_none {
                    return redirect_with_error(
                        &request.redirect_uri,
                        &OAuthProviderError::LoginRequired,
                        request.state.as_deref(),
                    );
                }
                // Park the full query so the flow resumes after login.
                let prompt_code = crate::crypto::random::generate_random_string(32);
                let expires = Utc::now() + Duration::seconds(options.code_expires_in);
                if let Err(e) = ctx
                    .adapter
                    .create_verification(
                        &format!("{LOGIN_PROMPT_PREFIX}{prompt_code}"),
                        &query.to_string(),
                        expires,
                    )
                    .await
                {
                    ctx.logger.error(&format!("Failed to park authorize query: {e}"));
                    return oauth_error(500, &OAuthProviderError::ServerError);
                }
                return PluginHandlerResponse::redirect_to(format!(
                    "{}?oidc_prompt={}",
                    options.login_page, prompt_code
                ));
            };

            // Consent already on file for all requested scopes?
            let consented = match load_consents(&ctx, &request.client_id, &user_id).await {
                Ok(consents) => has_consent(&consents, &request.client_id, &scopes),
                Err(_) => false,
            };

            let require_consent =
                !client.skip_consent && (!consented || prompts.iter().any(|p| p == "consent"));

            if prompt_none && require_consent {
                return redirect_with_error(
                    &request.redirect_uri,
                    &OAuthProviderError::ConsentRequired,
                    request.state.as_deref(),
                );
            }

            // Mint the code, bound to the grant.
            let code = generate_authorization_code();
            let grant = CodeGrant {
                client_id: request.client_id.clone(),
                redirect_uri: request.redirect_uri.clone(),
                user_id,
                scopes: scopes.clone(),
                code_challenge: request.code_challenge.clone(),
                code_challenge_method: request.code_challenge_method.clone(),
                nonce: request.nonce.clone(),
                state: request.state.clone(),
                require_consent: Some(require_consent),
                prompt: request.prompt.clone(),
                auth_time,
            };
            let expires = Utc::now() + Duration::seconds(options.code_expires_in);
            let stored = serde_json::to_string(&grant).unwrap_or_default();
            if let Err(e) = ctx
                .adapter
                .create_verification(&format!("{AUTH_CODE_PREFIX}{code}"), &stored, expires)
                .await
            {
                ctx.logger.error(&format!("Failed to store authorization code: {e}"));
                return oauth_error(500, &OAuthProviderError::ServerError);
            }

            if require_consent {
                return PluginHandlerResponse::redirect_to(format!(
                    "{}?consent_code={}&client_id={}&scope={}",
                    options.consent_page,
                    code,
                    urlencoding::encode(&request.client_id),
                    urlencoding::encode(&scopes.join(" ")),
                ));
            }

            let sep = if request.redirect_uri.contains('?') { "&" } else { "?" };
            let mut location = format!("{}{sep}code={code}", request.redirect_uri);
            if let Some(state) = &request.state {
                location.push_str(&format!("&state={}", urlencoding::encode(state)));
            }
            PluginHandlerResponse::redirect_to(location)
        })
    })
}

async fn load_consents(
    ctx: &AuthContext,
    client_id: &str,
    user_id: &str,
) -> Result<Vec<ConsentRecord>, crate::internal_adapter::AdapterError> {
    let rows = ctx
        .adapter
        .find_many(
            "oauthConsent",
            &[
                ("clientId", Value::String(client_id.into())),
                ("userId", Value::String(user_id.into())),
            ],
        )
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|row| {
            Some(ConsentRecord {
                id: row["id"].as_str()?.to_string(),
                client_id: row["clientId"].as_str()?.to_string(),
                user_id: row["userId"].as_str()?.to_string(),
                scopes: row["scopes"]
                    .as_str()
                    .map(|s| s.split_whitespace().map(String::from).collect())
                    .unwrap_or_default(),
                reference_id: row["referenceId"].as_str().map(String::from),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Consent endpoint
// ---------------------------------------------------------------------------

fn consent_handler() -> PluginHandlerFn {
    Arc::new(move |ctx_any, req: PluginHandlerRequest| {
        Box::pin(async move {
            let ctx = ctx_any
                .downcast::<AuthContext>()
                .expect("handler context is AuthContext");

            let Some(user_id) = req
                .session
                .as_ref()
                .and_then(|s| s["user"]["id"].as_str())
                .map(String::from)
            else {
                return oauth_error(401, &OAuthProviderError::LoginRequired);
            };

            let Some(consent_code) = req.body["consent_code"].as_str() else {
                return oauth_error(400, &OAuthProviderError::InvalidRequest);
            };
            let accept = req.body["accept"].as_bool().unwrap_or(false);

            // Re-read the pending grant parked by the authorize endpoint.
            let identifier = format!("{AUTH_CODE_PREFIX}{consent_code}");
            let Ok(Some(row)) = ctx.adapter.find_verification(&identifier).await else {
                return oauth_error(400, &OAuthProviderError::InvalidGrant);
            };
            let Ok(mut grant) =
                serde_json::from_str::<CodeGrant>(row["value"].as_str().unwrap_or("{}"))
            else {
                return oauth_error(400, &OAuthProviderError::InvalidGrant);
            };

            if grant.user_id != user_id {
                return oauth_error(403, &OAuthProviderError::AccessDenied);
            }

            if !accept {
                let _ = ctx.adapter.delete_verification(&identifier).await;
                return redirect_with_error(
                    &grant.redirect_uri,
                    &OAuthProviderError::AccessDenied,
                    grant.state.as_deref(),
                );
            }

            // The user may narrow the granted scopes, never widen them.
            let granted_scopes: Vec<String> = match req.body["scopes"].as_array() {
                Some(arr) => arr
                    .iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect(),
                None => grant.scopes.clone(),
            };
            if let Err(err) = validate_consent_scopes(&granted_scopes, &grant.scopes) {
                return oauth_error(400, &err);
            }

            // Upsert on (clientId, userId, referenceId).
            let reference_id = req.body["reference_id"].as_str();
            if let Err(e) =
                upsert_consent(&ctx, &grant.client_id, &user_id, &granted_scopes, reference_id)
                    .await
            {
                ctx.logger.error(&format!("Consent upsert failed: {e}"));
                return oauth_error(500, &OAuthProviderError::ServerError);
            }

            // Resume code issuance: mark the grant consented and drop
            // `consent` from any residual prompt so the resumed flow cannot
            // loop back here.
            grant.scopes = granted_scopes;
            grant.require_consent = Some(false);
            grant.prompt = strip_consent_prompt(grant.prompt.as_deref());

            let updated = serde_json::to_string(&grant).unwrap_or_default();
            if let Some(row_id) = row["id"].as_str() {
                if let Err(e) = ctx
                    .adapter
                    .update_by_id(
                        "verification",
                        row_id,
                        serde_json::json!({ "value": updated }),
                    )
                    .await
                {
                    ctx.logger.error(&format!("Consent grant update failed: {e}"));
                    return oauth_error(500, &OAuthProviderError::ServerError);
                }
            }

            let sep = if grant.redirect_uri.contains('?') { "&" } else { "?" };
            let mut location = format!("{}{sep}code={consent_code}", grant.redirect_uri);
            if let Some(state) = &grant.state {
                location.push_str(&format!("&state={}", urlencoding::encode(state)));
            }
            PluginHandlerResponse::ok(serde_json::json!({ "redirectURI": location }))
        })
    })
}

async fn upsert_consent(
    ctx: &AuthContext,
    client_id: &str,
    user_id: &str,
    scopes: &[String],
    reference_id: Option<&str>,
) -> Result<(), crate::internal_adapter::AdapterError> {
    let reference_value = reference_id
        .map(|r| Value::String(r.to_string()))
        .unwrap_or(Value::Null);

    let existing = ctx
        .adapter
        .find_one(
            "oauthConsent",
            &[
                ("clientId", Value::String(client_id.into())),
                ("userId", Value::String(user_id.into())),
                ("referenceId", reference_value.clone()),
            ],
        )
        .await?;

    match existing.and_then(|row| row["id"].as_str().map(String::from)) {
        Some(id) => {
            ctx.adapter
                .update_by_id(
                    "oauthConsent",
                    &id,
                    serde_json::json!({
                        "scopes": scopes.join(" "),
                        "updatedAt": Utc::now().to_rfc3339(),
                    }),
                )
                .await?;
        }
        None => {
            let consent = build_consent(user_id, client_id, scopes, reference_id);
            ctx.adapter
                .create(
                    "oauthConsent",
                    serde_json::json!({
                        "id": consent.id,
                        "clientId": consent.client_id,
                        "userId": consent.user_id,
                        "scopes": consent.scopes.join(" "),
                        "referenceId": reference_value,
                        "createdAt": consent.created_at.to_rfc3339(),
                        "updatedAt": consent.updated_at.to_rfc3339(),
                    }),
                )
                .await?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Token endpoint
// ---------------------------------------------------------------------------

fn parse_token_request(body: &Value) -> TokenRequest {
    let get = |key: &str| body.get(key).and_then(|v| v.as_str()).map(String::from);
    TokenRequest {
        grant_type: get("grant_type").unwrap_or_default(),
        code: get("code"),
        redirect_uri: get("redirect_uri"),
        client_id: get("client_id"),
        client_secret: get("client_secret"),
        refresh_token: get("refresh_token"),
        code_verifier: get("code_verifier"),
    }
}

/// client_id/client_secret from the body or a Basic Authorization header.
fn extract_client_credentials(
    request: &TokenRequest,
    headers: &HashMap<String, String>,
) -> Result<(String, Option<String>), OAuthProviderError> {
    if let Some(id) = &request.client_id {
        return Ok((id.clone(), request.client_secret.clone()));
    }

    let auth = headers
        .get("authorization")
        .or_else(|| headers.get("Authorization"));
    if let Some(encoded) = auth.and_then(|a| a.strip_prefix("Basic ")) {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine;
        let decoded = STANDARD
            .decode(encoded)
            .map_err(|_| OAuthProviderError::InvalidClient)?;
        let decoded = String::from_utf8(decoded).map_err(|_| OAuthProviderError::InvalidClient)?;
        let (id, secret) = decoded
            .split_once(':')
            .ok_or(OAuthProviderError::InvalidClient)?;
        if id.is_empty() {
            return Err(OAuthProviderError::InvalidClient);
        }
        return Ok((id.to_string(), Some(secret.to_string())));
    }

    Err(OAuthProviderError::InvalidClient)
}

fn authenticate_client(
    client: &RegisteredClient,
    presented_secret: Option<&str>,
) -> Result<(), OAuthProviderError> {
    if client.token_endpoint_auth_method == "none" {
        return Ok(());
    }
    let stored = client
        .client_secret
        .as_deref()
        .ok_or(OAuthProviderError::InvalidClient)?;
    let presented = presented_secret.ok_or(OAuthProviderError::InvalidClient)?;
    if crate::crypto::constant_time_equal(stored.as_bytes(), presented.as_bytes()) {
        Ok(())
    } else {
        Err(OAuthProviderError::InvalidClient)
    }
}

fn token_handler(
    options: Arc<OidcProviderOptions>,
    signing: Option<Arc<dyn SigningKeyProvider>>,
) -> PluginHandlerFn {
    let fallback_warned = Arc::new(std::sync::atomic::AtomicBool::new(false));
    Arc::new(move |ctx_any, req: PluginHandlerRequest| {
        let options = options.clone();
        let signing = signing.clone();
        let fallback_warned = fallback_warned.clone();
        Box::pin(async move {
            let ctx = ctx_any
                .downcast::<AuthContext>()
                .expect("handler context is AuthContext");

            // Operators should notice the signing downgrade; warn once.
            if signing.is_none()
                && !fallback_warned.swap(true, std::sync::atomic::Ordering::Relaxed)
            {
                ctx.logger.warn(
                    "No signing-key plugin registered: ID tokens use HS256 with the \
                     server secret and /jwks stays empty",
                );
            }

            let request = parse_token_request(&req.body);
            let (client_id, client_secret) =
                match extract_client_credentials(&request, &req.headers) {
                    Ok(creds) => creds,
                    Err(err) => return oauth_error(401, &err),
                };

            let Some(client) = find_client(&ctx, &options, &client_id).await else {
                return oauth_error(401, &OAuthProviderError::InvalidClient);
            };
            if let Err(err) = authenticate_client(&client, client_secret.as_deref()) {
                return oauth_error(401, &err);
            }

            match request.grant_type.as_str() {
                "authorization_code" => {
                    handle_code_grant(&ctx, &options, signing.as_deref(), &request, &client_id)
                        .await
                }
                "refresh_token" => handle_refresh_grant(&ctx, &options, &request, &client_id).await,
                _ => oauth_error(400, &OAuthProviderError::UnsupportedGrantType),
            }
        })
    })
}

async fn handle_code_grant(
    ctx: &AuthContext,
    options: &OidcProviderOptions,
    signing: Option<&dyn SigningKeyProvider>,
    request: &TokenRequest,
    client_id: &str,
) -> PluginHandlerResponse {
    let Some(code) = request.code.as_deref() else {
        return oauth_error(400, &OAuthProviderError::InvalidRequest);
    };

    // Single-use: the row is taken atomically; a concurrent or repeated
    // redemption of the same code finds nothing and fails here.
    let row = match ctx
        .adapter
        .take_verification(&format!("{AUTH_CODE_PREFIX}{code}"))
        .await
    {
        Ok(Some(row)) => row,
        Ok(None) => return oauth_error(400, &OAuthProviderError::InvalidGrant),
        Err(e) => {
            ctx.logger.error(&format!("Code lookup failed: {e}"));
            return oauth_error(500, &OAuthProviderError::ServerError);
        }
    };

    let expired = row["expiresAt"]
        .as_str()
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|exp| exp < Utc::now())
        .unwrap_or(true);
    if expired {
        return oauth_error(400, &OAuthProviderError::InvalidGrant);
    }

    let Ok(grant) = serde_json::from_str::<CodeGrant>(row["value"].as_str().unwrap_or("{}"))
    else {
        return oauth_error(400, &OAuthProviderError::InvalidGrant);
    };

    // A grant still waiting on consent is not redeemable.
    if grant.require_consent == Some(true) {
        return oauth_error(400, &OAuthProviderError::InvalidGrant);
    }

    if let Err(err) = validate_code_redemption(request, &grant, client_id) {
        return oauth_error(400, &err);
    }

    let include_refresh = grant.scopes.iter().any(|s| s == "offline_access");
    let (minted, mut response) = mint_tokens(options, &grant.scopes, include_refresh);

    let now = Utc::now();
    let token_row = serde_json::json!({
        "accessToken": minted.access_token,
        "refreshToken": minted.refresh_token,
        "accessTokenExpiresAt": minted.access_token_expires_at.to_rfc3339(),
        "refreshTokenExpiresAt": minted.refresh_token_expires_at.map(|dt| dt.to_rfc3339()),
        "clientId": grant.client_id.clone(),
        "userId": grant.user_id.clone(),
        "scopes": grant.scopes.join(" "),
        "createdAt": now.to_rfc3339(),
        "updatedAt": now.to_rfc3339(),
    });
    if let Err(e) = ctx.adapter.create("oauthAccessToken", token_row).await {
        ctx.logger.error(&format!("Access token write failed: {e}"));
        return oauth_error(500, &OAuthProviderError::ServerError);
    }

    if grant.scopes.iter().any(|s| s == "openid") {
        match build_id_token(ctx, options, signing, &grant).await {
            Ok(id_token) => response.id_token = Some(id_token),
            Err(e) => {
                ctx.logger.error(&format!("ID token signing failed: {e}"));
                return oauth_error(500, &OAuthProviderError::ServerError);
            }
        }
    }

    PluginHandlerResponse::ok(serde_json::to_value(response).unwrap_or_default())
}

async fn handle_refresh_grant(
    ctx: &AuthContext,
    options: &OidcProviderOptions,
    request: &TokenRequest,
    client_id: &str,
) -> PluginHandlerResponse {
    let Some(refresh_token) = request.refresh_token.as_deref() else {
        return oauth_error(400, &OAuthProviderError::InvalidRequest);
    };

    let existing = match ctx
        .adapter
        .find_one(
            "oauthAccessToken",
            &[("refreshToken", Value::String(refresh_token.into()))],
        )
        .await
    {
        Ok(Some(row)) => row,
        Ok(None) => return oauth_error(400, &OAuthProviderError::InvalidGrant),
        Err(e) => {
            ctx.logger.error(&format!("Refresh token lookup failed: {e}"));
            return oauth_error(500, &OAuthProviderError::ServerError);
        }
    };

    if existing["clientId"].as_str() != Some(client_id) {
        return oauth_error(400, &OAuthProviderError::InvalidGrant);
    }

    let refresh_expired = existing["refreshTokenExpiresAt"]
        .as_str()
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|exp| exp < Utc::now())
        .unwrap_or(false);
    if refresh_expired {
        return oauth_error(400, &OAuthProviderError::InvalidGrant);
    }

    let scopes: Vec<String> = existing["scopes"]
        .as_str()
        .map(|s| s.split_whitespace().map(String::from).collect())
        .unwrap_or_default();

    // Rotation: the old pair is overwritten in place, so the previous
    // refresh token dies with this exchange.
    let (minted, response) = mint_tokens(options, &scopes, true);
    if let Some(id) = existing["id"].as_str() {
        let update = serde_json::json!({
            "accessToken": minted.access_token,
            "refreshToken": minted.refresh_token,
            "accessTokenExpiresAt": minted.access_token_expires_at.to_rfc3339(),
            "refreshTokenExpiresAt": minted.refresh_token_expires_at.map(|dt| dt.to_rfc3339()),
            "updatedAt": Utc::now().to_rfc3339(),
        });
        if let Err(e) = ctx.adapter.update_by_id("oauthAccessToken", id, update).await {
            ctx.logger.error(&format!("Refresh rotation failed: {e}"));
            return oauth_error(500, &OAuthProviderError::ServerError);
        }
    }

    PluginHandlerResponse::ok(serde_json::to_value(response).unwrap_or_default())
}

/// Build and sign the ID token. Asymmetric when a signing-key provider is
/// registered; HS256 with the server secret otherwise.
async fn build_id_token(
    ctx: &AuthContext,
    options: &OidcProviderOptions,
    signing: Option<&dyn SigningKeyProvider>,
    grant: &CodeGrant,
) -> Result<String, gatekit_core::error::AuthError> {
    let now = Utc::now().timestamp();
    let issuer = format!("{}{}", ctx.base_url.as_deref().unwrap_or(""), ctx.base_path);

    let mut claims = serde_json::json!({
        "iss": issuer,
        "sub": grant.user_id,
        "aud": grant.client_id,
        "iat": now,
        "exp": now + options.access_token_expires_in,
    });
    if let Some(nonce) = &grant.nonce {
        claims["nonce"] = Value::String(nonce.clone());
    }
    if let Some(auth_time) = grant.auth_time {
        claims["auth_time"] = Value::Number(auth_time.into());
    }

    if let Ok(Some(user)) = ctx.adapter.find_user_by_id(&grant.user_id).await {
        apply_scope_claims(&mut claims, &user, &grant.scopes);
    }

    match signing {
        Some(provider) => provider.sign_id_token(&claims),
        None => {
            // HS256 fallback with the server secret. sign_jwt supplies
            // iat/exp, so drop the duplicates from the claim set.
            if let Some(obj) = claims.as_object_mut() {
                obj.remove("iat");
                obj.remove("exp");
            }
            crate::crypto::jwt::sign_jwt(
                &claims,
                &ctx.secret,
                options.access_token_expires_in as u64,
            )
        }
    }
}

/// Copy profile/email claims into a claim set, gated by granted scopes.
fn apply_scope_claims(claims: &mut Value, user: &Value, scopes: &[String]) {
    if scopes.iter().any(|s| s == "profile") {
        if let Some(name) = user["name"].as_str() {
            claims["name"] = Value::String(name.to_string());
            let mut parts = name.splitn(2, ' ');
            if let Some(given) = parts.next() {
                claims["given_name"] = Value::String(given.to_string());
            }
            if let Some(family) = parts.next() {
                claims["family_name"] = Value::String(family.to_string());
            }
        }
        if let Some(image) = user["image"].as_str() {
            claims["picture"] = Value::String(image.to_string());
        }
    }
    if scopes.iter().any(|s| s == "email") {
        if let Some(email) = user["email"].as_str() {
            claims["email"] = Value::String(email.to_string());
        }
        if let Some(verified) = user["emailVerified"].as_bool() {
            claims["email_verified"] = Value::Bool(verified);
        }
    }
}

// ---------------------------------------------------------------------------
// Userinfo endpoint
// ---------------------------------------------------------------------------

fn userinfo_handler() -> PluginHandlerFn {
    Arc::new(move |ctx_any, req: PluginHandlerRequest| {
        Box::pin(async move {
            let ctx = ctx_any
                .downcast::<AuthContext>()
                .expect("handler context is AuthContext");

            let bearer = req
                .headers
                .get("authorization")
                .or_else(|| req.headers.get("Authorization"))
                .and_then(|a| a.strip_prefix("Bearer "));
            let Some(access_token) = bearer else {
                return oauth_error(401, &OAuthProviderError::InvalidToken);
            };

            let token_row = match ctx
                .adapter
                .find_one(
                    "oauthAccessToken",
                    &[("accessToken", Value::String(access_token.into()))],
                )
                .await
            {
                Ok(Some(row)) => row,
                Ok(None) => return oauth_error(401, &OAuthProviderError::InvalidToken),
                Err(e) => {
                    ctx.logger.error(&format!("Access token lookup failed: {e}"));
                    return oauth_error(500, &OAuthProviderError::ServerError);
                }
            };

            let expired = token_row["accessTokenExpiresAt"]
                .as_str()
                .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
                .map(|exp| exp < Utc::now())
                .unwrap_or(true);
            if expired {
                return oauth_error(401, &OAuthProviderError::InvalidToken);
            }

            let user_id = token_row["userId"].as_str().unwrap_or_default();
            let scopes: Vec<String> = token_row["scopes"]
                .as_str()
                .map(|s| s.split_whitespace().map(String::from).collect())
                .unwrap_or_default();

            let Ok(Some(user)) = ctx.adapter.find_user_by_id(user_id).await else {
                return oauth_error(401, &OAuthProviderError::InvalidToken);
            };

            let mut claims = serde_json::json!({ "sub": user_id });
            apply_scope_claims(&mut claims, &user, &scopes);

            // Plugin-contributed claims last, so extensions may add but the
            // standard claims stay authoritative only if plugins behave.
            for (name, value) in ctx.plugin_registry.additional_userinfo_claims(&user, &scopes)
            {
                claims[name] = value;
            }

            PluginHandlerResponse::ok(claims)
        })
    })
}

// ---------------------------------------------------------------------------
// JWKS endpoint
// ---------------------------------------------------------------------------

fn jwks_handler(signing: Option<Arc<dyn SigningKeyProvider>>) -> PluginHandlerFn {
    Arc::new(move |_ctx_any, _req: PluginHandlerRequest| {
        let signing = signing.clone();
        Box::pin(async move {
            match signing {
                Some(provider) => PluginHandlerResponse::ok(provider.public_jwks()),
                // HMAC keys must never be published; with only symmetric
                // signing configured the key set is empty.
                None => PluginHandlerResponse::ok(serde_json::json!({ "keys": [] })),
            }
        })
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plugin_identity_and_endpoints() {
        let plugin = OidcProviderPlugin::default();
        assert_eq!(plugin.id(), "oidc-provider");

        let endpoints = plugin.endpoints();
        let paths: Vec<&str> = endpoints.iter().map(|e| e.path.as_str()).collect();
        assert!(paths.contains(&"/.well-known/openid-configuration"));
        assert!(paths.contains(&"/oauth2/authorize"));
        assert!(paths.contains(&"/oauth2/consent"));
        assert!(paths.contains(&"/oauth2/token"));
        assert!(paths.contains(&"/oauth2/userinfo"));
        assert!(paths.contains(&"/jwks"));
        assert!(paths.contains(&"/oauth2/register"));
    }

    #[test]
    fn schema_tables() {
        let plugin = OidcProviderPlugin::default();
        let tables = plugin.schema();
        let names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["oauthApplication", "oauthAccessToken", "oauthConsent"]
        );
    }

    #[test]
    fn client_secret_hidden_in_schema() {
        let table = oauth_application_table();
        assert!(table.hidden_fields().contains(&"clientSecret"));
    }

    #[test]
    fn prompt_parsing() {
        assert_eq!(parse_prompt(Some("login consent")).unwrap(), vec!["login", "consent"]);
        assert_eq!(parse_prompt(Some("none")).unwrap(), vec!["none"]);
        assert!(parse_prompt(Some("none login")).is_err());
        assert!(parse_prompt(None).unwrap().is_empty());
    }

    #[test]
    fn client_credentials_from_basic_header() {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine;

        let mut headers = HashMap::new();
        headers.insert(
            "authorization".to_string(),
            format!("Basic {}", STANDARD.encode("my-client:my-secret")),
        );
        let (id, secret) =
            extract_client_credentials(&TokenRequest::default(), &headers).unwrap();
        assert_eq!(id, "my-client");
        assert_eq!(secret.as_deref(), Some("my-secret"));
    }

    #[test]
    fn client_credentials_body_wins() {
        let request = TokenRequest {
            client_id: Some("body-client".into()),
            client_secret: Some("body-secret".into()),
            ..Default::default()
        };
        let (id, secret) = extract_client_credentials(&request, &HashMap::new()).unwrap();
        assert_eq!(id, "body-client");
        assert_eq!(secret.as_deref(), Some("body-secret"));
    }

    #[test]
    fn missing_credentials_rejected() {
        assert!(extract_client_credentials(&TokenRequest::default(), &HashMap::new()).is_err());
    }

    #[test]
    fn client_authentication() {
        let mut client = RegisteredClient {
            id: "row".into(),
            client_id: "c".into(),
            client_secret: Some("s3cret".into()),
            name: "C".into(),
            icon: None,
            redirect_uris: vec![],
            client_type: "web".into(),
            token_endpoint_auth_method: "client_secret_basic".into(),
            disabled: false,
            skip_consent: false,
            metadata: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(authenticate_client(&client, Some("s3cret")).is_ok());
        assert!(authenticate_client(&client, Some("wrong")).is_err());
        assert!(authenticate_client(&client, None).is_err());

        client.token_endpoint_auth_method = "none".into();
        assert!(authenticate_client(&client, None).is_ok());
    }

    #[test]
    fn scope_claims_are_gated() {
        let user = serde_json::json!({
            "name": "Ada Lovelace",
            "email": "ada@example.com",
            "emailVerified": true,
            "image": "https://img.example.com/ada.png",
        });

        let mut profile_only = serde_json::json!({"sub": "u1"});
        apply_scope_claims(&mut profile_only, &user, &["openid".into(), "profile".into()]);
        assert_eq!(profile_only["name"], "Ada Lovelace");
        assert_eq!(profile_only["given_name"], "Ada");
        assert_eq!(profile_only["family_name"], "Lovelace");
        assert!(profile_only.get("email").is_none());

        let mut email_only = serde_json::json!({"sub": "u1"});
        apply_scope_claims(&mut email_only, &user, &["openid".into(), "email".into()]);
        assert_eq!(email_only["email"], "ada@example.com");
        assert_eq!(email_only["email_verified"], true);
        assert!(email_only.get("name").is_none());
    }
}
