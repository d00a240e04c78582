// The internal adapter: typed auth operations built on the raw Adapter
// trait. Owns tenant scoping (every session read/write gains a tenantId
// clause when a tenant is in scope) and the secondary-storage read-through
// for session lookups.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde_json::Value;

use gatekit_core::db::adapter::{Adapter, FindManyQuery, WhereClause};
use gatekit_core::db::secondary_storage::SecondaryStorage;

/// Errors from the internal adapter.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Record not found")]
    NotFound,

    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<gatekit_core::error::AuthError> for AdapterError {
    fn from(e: gatekit_core::error::AuthError) -> Self {
        Self::Database(e.to_string())
    }
}

/// Session paired with its user.
#[derive(Debug, Clone)]
pub struct SessionWithUser {
    pub session: Value,
    pub user: Value,
}

/// Options for creating a session.
#[derive(Debug, Default, Clone)]
pub struct CreateSessionOptions {
    /// Caps the session at one day and suppresses rolling renewal.
    pub dont_remember: bool,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    /// Tenant the session belongs to, when tenancy is enabled.
    pub tenant_id: Option<String>,
    /// Extra session fields contributed by plugins.
    pub overrides: Option<serde_json::Map<String, Value>>,
}

/// High-level auth operations. Route handlers and plugins talk to this, not
/// to the raw adapter.
#[async_trait]
pub trait InternalAdapter: Send + Sync {
    // ─── Users ───────────────────────────────────────────────────

    async fn create_user(&self, data: Value) -> Result<Value, AdapterError>;
    async fn find_user_by_id(&self, id: &str) -> Result<Option<Value>, AdapterError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<Value>, AdapterError>;
    async fn update_user(&self, id: &str, data: Value) -> Result<Value, AdapterError>;

    // ─── Sessions ────────────────────────────────────────────────

    /// Create a session: generates the opaque token, computes the expiry,
    /// persists the row, and (when configured) seeds the secondary store.
    async fn create_session(
        &self,
        user_id: &str,
        options: CreateSessionOptions,
        expires_in_secs: i64,
    ) -> Result<Value, AdapterError>;

    /// Resolve a session and its user by token, scoped to `tenant`. A row
    /// under a different tenant behaves as not-found.
    async fn find_session_and_user(
        &self,
        token: &str,
        tenant: Option<&str>,
    ) -> Result<Option<SessionWithUser>, AdapterError>;

    /// Update a session row. `Ok(None)` means no row matched — the session
    /// was deleted (or belongs to another tenant) while this request was in
    /// flight, and the caller must treat it as invalidated.
    async fn update_session(
        &self,
        token: &str,
        data: Value,
        tenant: Option<&str>,
    ) -> Result<Option<Value>, AdapterError>;

    async fn delete_session(&self, token: &str, tenant: Option<&str>)
        -> Result<(), AdapterError>;

    async fn list_sessions_for_user(
        &self,
        user_id: &str,
        tenant: Option<&str>,
    ) -> Result<Vec<Value>, AdapterError>;

    /// Delete all of a user's sessions, optionally keeping one token alive
    /// (the revoke-other-sessions case).
    async fn delete_sessions_for_user(
        &self,
        user_id: &str,
        tenant: Option<&str>,
        except_token: Option<&str>,
    ) -> Result<(), AdapterError>;

    // ─── Accounts ────────────────────────────────────────────────

    async fn find_account_by_provider(
        &self,
        provider_id: &str,
        account_id: &str,
    ) -> Result<Option<Value>, AdapterError>;

    async fn find_accounts_by_user_id(&self, user_id: &str) -> Result<Vec<Value>, AdapterError>;

    async fn update_account_by_id(&self, id: &str, data: Value) -> Result<Value, AdapterError>;

    /// Link an account to an existing user.
    async fn link_account(&self, account_data: Value) -> Result<Value, AdapterError>;

    /// Create a user and their first account. The account is only created
    /// after the user row exists, so a failure can never leave an account
    /// without its user.
    async fn create_oauth_user(
        &self,
        user_data: Value,
        account_data: Value,
    ) -> Result<Value, AdapterError>;

    // ─── Verifications ───────────────────────────────────────────

    async fn create_verification(
        &self,
        identifier: &str,
        value: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Value, AdapterError>;

    async fn find_verification(&self, identifier: &str) -> Result<Option<Value>, AdapterError>;

    /// Atomically consume a verification row. The second caller for the
    /// same identifier gets `None`, which is what makes OAuth state and
    /// authorization codes single-use.
    async fn take_verification(&self, identifier: &str) -> Result<Option<Value>, AdapterError>;

    async fn delete_verification(&self, identifier: &str) -> Result<(), AdapterError>;

    // ─── Generic table operations (plugins) ──────────────────────

    async fn create(&self, model: &str, data: Value) -> Result<Value, AdapterError>;
    async fn find_one(&self, model: &str, filter: &[(&str, Value)])
        -> Result<Option<Value>, AdapterError>;
    async fn find_many(&self, model: &str, filter: &[(&str, Value)])
        -> Result<Vec<Value>, AdapterError>;
    async fn update_by_id(&self, model: &str, id: &str, data: Value)
        -> Result<Value, AdapterError>;
    async fn delete_by_id(&self, model: &str, id: &str) -> Result<(), AdapterError>;
    async fn delete_many(&self, model: &str, filter: &[(&str, Value)])
        -> Result<i64, AdapterError>;
}

// ─── Concrete implementation ─────────────────────────────────────

/// Internal adapter backed by a raw `Adapter`, with optional secondary
/// storage for session payloads.
pub struct StoreAdapter {
    adapter: Arc<dyn Adapter>,
    secondary_storage: Option<Arc<dyn SecondaryStorage>>,
    /// Keep session rows in the primary DB even when secondary storage is
    /// active.
    store_in_db: bool,
}

impl StoreAdapter {
    pub fn new(adapter: Arc<dyn Adapter>) -> Self {
        Self {
            adapter,
            secondary_storage: None,
            store_in_db: true,
        }
    }

    pub fn with_secondary_storage(
        adapter: Arc<dyn Adapter>,
        secondary: Arc<dyn SecondaryStorage>,
        store_in_db: bool,
    ) -> Self {
        Self {
            adapter,
            secondary_storage: Some(secondary),
            store_in_db,
        }
    }

    /// WHERE clauses for a session lookup: token equality, plus tenant
    /// equality when a tenant is in scope.
    fn session_where(token: &str, tenant: Option<&str>) -> Vec<WhereClause> {
        match tenant {
            Some(tenant_id) => vec![
                WhereClause::eq("token", token).and(),
                WhereClause::eq("tenantId", tenant_id),
            ],
            None => vec![WhereClause::eq("token", token)],
        }
    }

    fn user_sessions_where(user_id: &str, tenant: Option<&str>) -> Vec<WhereClause> {
        match tenant {
            Some(tenant_id) => vec![
                WhereClause::eq("userId", user_id).and(),
                WhereClause::eq("tenantId", tenant_id),
            ],
            None => vec![WhereClause::eq("userId", user_id)],
        }
    }

    fn ttl_seconds(expires_at_ms: i64) -> i64 {
        ((expires_at_ms - Utc::now().timestamp_millis()) / 1000).max(0)
    }

    /// Secondary-store key for a session payload. Tenant-qualified so a
    /// colliding token can never read across tenants from the cache either.
    fn secondary_key(token: &str, tenant: Option<&str>) -> String {
        match tenant {
            Some(tenant_id) => format!("session:{tenant_id}:{token}"),
            None => format!("session:{token}"),
        }
    }

    /// Key of the per-user token list, used to enumerate sessions for
    /// revoke-all when rows live only in secondary storage.
    fn active_sessions_key(user_id: &str, tenant: Option<&str>) -> String {
        match tenant {
            Some(tenant_id) => format!("active-sessions:{tenant_id}:{user_id}"),
            None => format!("active-sessions:{user_id}"),
        }
    }

    async fn store_session_in_secondary(
        &self,
        token: &str,
        user_id: &str,
        tenant: Option<&str>,
        session: &Value,
        user: &Value,
        expires_at_ms: i64,
    ) {
        let Some(secondary) = &self.secondary_storage else {
            return;
        };
        let ttl = Self::ttl_seconds(expires_at_ms);
        if ttl <= 0 {
            return;
        }
        let payload = serde_json::json!({ "session": session, "user": user });
        let _ = secondary
            .set(&Self::secondary_key(token, tenant), &payload.to_string(), ttl)
            .await;

        // Track the token in the user's active-sessions list. Expired
        // entries are pruned here; the list's TTL follows the
        // furthest-expiring session.
        let list_key = Self::active_sessions_key(user_id, tenant);
        let now_ms = Utc::now().timestamp_millis();
        let mut list: Vec<Value> = match secondary.get(&list_key).await {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            None => Vec::new(),
        };
        list.retain(|entry| {
            entry["expiresAt"].as_i64().unwrap_or(0) > now_ms
                && entry["token"].as_str() != Some(token)
        });
        list.push(serde_json::json!({ "token": token, "expiresAt": expires_at_ms }));

        let furthest = list
            .iter()
            .filter_map(|entry| entry["expiresAt"].as_i64())
            .max()
            .unwrap_or(expires_at_ms);
        let list_ttl = Self::ttl_seconds(furthest);
        if list_ttl > 0 {
            let _ = secondary
                .set(
                    &list_key,
                    &serde_json::to_string(&list).unwrap_or_default(),
                    list_ttl,
                )
                .await;
        }
    }

    async fn remove_session_from_secondary(&self, token: &str, tenant: Option<&str>) {
        if let Some(secondary) = &self.secondary_storage {
            let _ = secondary.delete(&Self::secondary_key(token, tenant)).await;
        }
    }

    /// Tokens recorded in the user's active-sessions list.
    async fn secondary_session_tokens(
        &self,
        user_id: &str,
        tenant: Option<&str>,
    ) -> Vec<String> {
        let Some(secondary) = &self.secondary_storage else {
            return Vec::new();
        };
        let Some(raw) = secondary
            .get(&Self::active_sessions_key(user_id, tenant))
            .await
        else {
            return Vec::new();
        };
        let list: Vec<Value> = serde_json::from_str(&raw).unwrap_or_default();
        let now_ms = Utc::now().timestamp_millis();
        list.iter()
            .filter(|entry| entry["expiresAt"].as_i64().unwrap_or(0) > now_ms)
            .filter_map(|entry| entry["token"].as_str().map(String::from))
            .collect()
    }
}

fn filter_to_clauses(filter: &[(&str, Value)]) -> Vec<WhereClause> {
    let last = filter.len().saturating_sub(1);
    filter
        .iter()
        .enumerate()
        .map(|(i, (field, value))| {
            let clause = WhereClause::eq(*field, value.clone());
            if i < last {
                clause.and()
            } else {
                clause
            }
        })
        .collect()
}

fn parse_expires_at_ms(session: &Value) -> Option<i64> {
    session["expiresAt"]
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.timestamp_millis())
}

#[async_trait]
impl InternalAdapter for StoreAdapter {
    // ─── Users ───────────────────────────────────────────────────

    async fn create_user(&self, mut data: Value) -> Result<Value, AdapterError> {
        if let Some(obj) = data.as_object_mut() {
            if let Some(email) = obj.get("email").and_then(|e| e.as_str()) {
                obj.insert("email".into(), Value::String(email.to_lowercase()));
            }
        }
        self.adapter.create("user", data, None).await.map_err(Into::into)
    }

    async fn find_user_by_id(&self, id: &str) -> Result<Option<Value>, AdapterError> {
        self.adapter
            .find_one("user", &[WhereClause::eq("id", id)])
            .await
            .map_err(Into::into)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<Value>, AdapterError> {
        let email = email.to_lowercase();
        self.adapter
            .find_one("user", &[WhereClause::eq("email", email.as_str())])
            .await
            .map_err(Into::into)
    }

    async fn update_user(&self, id: &str, data: Value) -> Result<Value, AdapterError> {
        self.adapter
            .update("user", &[WhereClause::eq("id", id)], data)
            .await?
            .ok_or(AdapterError::NotFound)
    }

    // ─── Sessions ────────────────────────────────────────────────

    async fn create_session(
        &self,
        user_id: &str,
        options: CreateSessionOptions,
        expires_in_secs: i64,
    ) -> Result<Value, AdapterError> {
        // dont_remember sessions are capped at one day.
        let effective_expiry = if options.dont_remember {
            expires_in_secs.min(86_400)
        } else {
            expires_in_secs
        };

        let now = Utc::now();
        let expires_at = now + TimeDelta::seconds(effective_expiry);
        let token = crate::crypto::random::generate_random_string(32);

        let mut data = serde_json::json!({
            "userId": user_id,
            "token": token.clone(),
            "expiresAt": expires_at.to_rfc3339(),
            "createdAt": now.to_rfc3339(),
            "updatedAt": now.to_rfc3339(),
        });

        if let Some(obj) = data.as_object_mut() {
            if let Some(ip) = &options.ip_address {
                obj.insert("ipAddress".into(), Value::String(ip.clone()));
            }
            if let Some(ua) = &options.user_agent {
                obj.insert("userAgent".into(), Value::String(ua.clone()));
            }
            if let Some(tenant_id) = &options.tenant_id {
                obj.insert("tenantId".into(), Value::String(tenant_id.clone()));
            }
            if let Some(overrides) = &options.overrides {
                for (k, v) in overrides {
                    // New sessions always get fresh ids and tokens.
                    if k == "id" || k == "token" {
                        continue;
                    }
                    obj.insert(k.clone(), v.clone());
                }
            }
        }

        let session = if self.store_in_db || self.secondary_storage.is_none() {
            self.adapter.create("session", data.clone(), None).await?
        } else {
            data.clone()
        };

        if self.secondary_storage.is_some() {
            let user = self
                .find_user_by_id(user_id)
                .await?
                .unwrap_or_else(|| serde_json::json!({}));
            self.store_session_in_secondary(
                &token,
                user_id,
                options.tenant_id.as_deref(),
                &session,
                &user,
                expires_at.timestamp_millis(),
            )
            .await;
        }

        Ok(session)
    }

    async fn find_session_and_user(
        &self,
        token: &str,
        tenant: Option<&str>,
    ) -> Result<Option<SessionWithUser>, AdapterError> {
        // Secondary storage first; TTL expiry there mirrors the row's
        // expiresAt so a hit is always a live session.
        if let Some(secondary) = &self.secondary_storage {
            if let Some(cached) = secondary.get(&Self::secondary_key(token, tenant)).await {
                if let Ok(parsed) = serde_json::from_str::<Value>(&cached) {
                    let session = parsed["session"].clone();
                    let user = parsed["user"].clone();
                    if !session.is_null() && !user.is_null() {
                        return Ok(Some(SessionWithUser { session, user }));
                    }
                }
            }
            if !self.store_in_db {
                return Ok(None);
            }
        }

        let session = self
            .adapter
            .find_one("session", &Self::session_where(token, tenant))
            .await?;

        let Some(session) = session else {
            return Ok(None);
        };

        let user_id = session["userId"]
            .as_str()
            .ok_or_else(|| AdapterError::Database("Session missing userId field".into()))?;

        match self.find_user_by_id(user_id).await? {
            Some(user) => Ok(Some(SessionWithUser { session, user })),
            None => Ok(None),
        }
    }

    async fn update_session(
        &self,
        token: &str,
        data: Value,
        tenant: Option<&str>,
    ) -> Result<Option<Value>, AdapterError> {
        let updated = self
            .adapter
            .update("session", &Self::session_where(token, tenant), data)
            .await?;

        if let Some(updated_session) = &updated {
            // Refresh the cached payload; on any failure the cache simply
            // expires on its own TTL.
            if let Some(secondary) = &self.secondary_storage {
                let key = Self::secondary_key(token, tenant);
                if let Some(cached) = secondary.get(&key).await {
                    if let Ok(mut parsed) = serde_json::from_str::<Value>(&cached) {
                        if let (Some(cached_session), Some(updated_obj)) =
                            (parsed["session"].as_object_mut(), updated_session.as_object())
                        {
                            for (k, v) in updated_obj {
                                cached_session.insert(k.clone(), v.clone());
                            }
                        }
                        if let Some(expires_at_ms) = parse_expires_at_ms(updated_session) {
                            let ttl = Self::ttl_seconds(expires_at_ms);
                            if ttl > 0 {
                                let _ = secondary.set(&key, &parsed.to_string(), ttl).await;
                            }
                        }
                    }
                }
            }
        }

        Ok(updated)
    }

    async fn delete_session(
        &self,
        token: &str,
        tenant: Option<&str>,
    ) -> Result<(), AdapterError> {
        self.remove_session_from_secondary(token, tenant).await;
        self.adapter
            .delete("session", &Self::session_where(token, tenant))
            .await
            .map_err(Into::into)
    }

    async fn list_sessions_for_user(
        &self,
        user_id: &str,
        tenant: Option<&str>,
    ) -> Result<Vec<Value>, AdapterError> {
        self.adapter
            .find_many(
                "session",
                FindManyQuery {
                    where_clauses: Self::user_sessions_where(user_id, tenant),
                    ..Default::default()
                },
            )
            .await
            .map_err(Into::into)
    }

    async fn delete_sessions_for_user(
        &self,
        user_id: &str,
        tenant: Option<&str>,
        except_token: Option<&str>,
    ) -> Result<(), AdapterError> {
        let mut tokens: Vec<String> = self
            .list_sessions_for_user(user_id, tenant)
            .await?
            .into_iter()
            .filter_map(|session| session["token"].as_str().map(String::from))
            .collect();

        // In secondary-only mode the primary has no rows; the per-user
        // token list is the enumeration source.
        for token in self.secondary_session_tokens(user_id, tenant).await {
            if !tokens.contains(&token) {
                tokens.push(token);
            }
        }

        for token in tokens {
            if Some(token.as_str()) == except_token {
                continue;
            }
            self.delete_session(&token, tenant).await?;
        }

        if except_token.is_none() {
            if let Some(secondary) = &self.secondary_storage {
                let _ = secondary
                    .delete(&Self::active_sessions_key(user_id, tenant))
                    .await;
            }
        }
        Ok(())
    }

    // ─── Accounts ────────────────────────────────────────────────

    async fn find_account_by_provider(
        &self,
        provider_id: &str,
        account_id: &str,
    ) -> Result<Option<Value>, AdapterError> {
        self.adapter
            .find_one(
                "account",
                &[
                    WhereClause::eq("providerId", provider_id).and(),
                    WhereClause::eq("accountId", account_id),
                ],
            )
            .await
            .map_err(Into::into)
    }

    async fn find_accounts_by_user_id(&self, user_id: &str) -> Result<Vec<Value>, AdapterError> {
        self.adapter
            .find_many(
                "account",
                FindManyQuery {
                    where_clauses: vec![WhereClause::eq("userId", user_id)],
                    ..Default::default()
                },
            )
            .await
            .map_err(Into::into)
    }

    async fn update_account_by_id(&self, id: &str, data: Value) -> Result<Value, AdapterError> {
        self.adapter
            .update("account", &[WhereClause::eq("id", id)], data)
            .await?
            .ok_or(AdapterError::NotFound)
    }

    async fn link_account(&self, mut account_data: Value) -> Result<Value, AdapterError> {
        if let Some(obj) = account_data.as_object_mut() {
            let now = Utc::now().to_rfc3339();
            obj.entry("createdAt").or_insert(Value::String(now.clone()));
            obj.entry("updatedAt").or_insert(Value::String(now));
        }
        self.adapter
            .create("account", account_data, None)
            .await
            .map_err(Into::into)
    }

    async fn create_oauth_user(
        &self,
        mut user_data: Value,
        mut account_data: Value,
    ) -> Result<Value, AdapterError> {
        if let Some(obj) = user_data.as_object_mut() {
            if let Some(email) = obj.get("email").and_then(|e| e.as_str()) {
                obj.insert("email".into(), Value::String(email.to_lowercase()));
            }
        }

        let user = self.adapter.create("user", user_data, None).await?;
        let user_id = user["id"]
            .as_str()
            .ok_or_else(|| AdapterError::Serialization("Created user missing id".into()))?;

        if let Some(obj) = account_data.as_object_mut() {
            obj.insert("userId".into(), Value::String(user_id.to_string()));
        }

        if let Err(e) = self.adapter.create("account", account_data, None).await {
            // Unwind the half-created pair rather than leaving a user that
            // can never sign in.
            let _ = self
                .adapter
                .delete("user", &[WhereClause::eq("id", user_id)])
                .await;
            return Err(e.into());
        }

        Ok(user)
    }

    // ─── Verifications ───────────────────────────────────────────

    async fn create_verification(
        &self,
        identifier: &str,
        value: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Value, AdapterError> {
        let data = serde_json::json!({
            "identifier": identifier,
            "value": value,
            "expiresAt": expires_at.to_rfc3339(),
        });
        self.adapter
            .create("verification", data, None)
            .await
            .map_err(Into::into)
    }

    async fn find_verification(&self, identifier: &str) -> Result<Option<Value>, AdapterError> {
        self.adapter
            .find_one("verification", &[WhereClause::eq("identifier", identifier)])
            .await
            .map_err(Into::into)
    }

    async fn take_verification(&self, identifier: &str) -> Result<Option<Value>, AdapterError> {
        self.adapter
            .take("verification", &[WhereClause::eq("identifier", identifier)])
            .await
            .map_err(Into::into)
    }

    async fn delete_verification(&self, identifier: &str) -> Result<(), AdapterError> {
        self.adapter
            .delete("verification", &[WhereClause::eq("identifier", identifier)])
            .await
            .map_err(Into::into)
    }

    // ─── Generic table operations ────────────────────────────────

    async fn create(&self, model: &str, data: Value) -> Result<Value, AdapterError> {
        self.adapter.create(model, data, None).await.map_err(Into::into)
    }

    async fn find_one(
        &self,
        model: &str,
        filter: &[(&str, Value)],
    ) -> Result<Option<Value>, AdapterError> {
        self.adapter
            .find_one(model, &filter_to_clauses(filter))
            .await
            .map_err(Into::into)
    }

    async fn find_many(
        &self,
        model: &str,
        filter: &[(&str, Value)],
    ) -> Result<Vec<Value>, AdapterError> {
        self.adapter
            .find_many(
                model,
                FindManyQuery {
                    where_clauses: filter_to_clauses(filter),
                    ..Default::default()
                },
            )
            .await
            .map_err(Into::into)
    }

    async fn update_by_id(&self, model: &str, id: &str, data: Value) -> Result<Value, AdapterError> {
        self.adapter
            .update(model, &[WhereClause::eq("id", id)], data)
            .await?
            .ok_or(AdapterError::NotFound)
    }

    async fn delete_by_id(&self, model: &str, id: &str) -> Result<(), AdapterError> {
        self.adapter
            .delete(model, &[WhereClause::eq("id", id)])
            .await
            .map_err(Into::into)
    }

    async fn delete_many(
        &self,
        model: &str,
        filter: &[(&str, Value)],
    ) -> Result<i64, AdapterError> {
        self.adapter
            .delete_many(model, &filter_to_clauses(filter))
            .await
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_where_includes_tenant_clause() {
        let clauses = StoreAdapter::session_where("tok", Some("tenant-1"));
        assert_eq!(clauses.len(), 2);
        assert_eq!(clauses[0].field, "token");
        assert_eq!(clauses[1].field, "tenantId");
        assert_eq!(clauses[1].value, "tenant-1");

        let unscoped = StoreAdapter::session_where("tok", None);
        assert_eq!(unscoped.len(), 1);
    }

    #[test]
    fn secondary_key_is_tenant_qualified() {
        assert_eq!(StoreAdapter::secondary_key("t", None), "session:t");
        assert_eq!(
            StoreAdapter::secondary_key("t", Some("acme")),
            "session:acme:t"
        );
    }

    #[test]
    fn filter_to_clauses_connects_with_and() {
        let clauses = filter_to_clauses(&[
            ("clientId", Value::String("c1".into())),
            ("userId", Value::String("u1".into())),
        ]);
        assert_eq!(clauses.len(), 2);
        assert!(clauses[0].connector.is_some());
        assert!(clauses[1].connector.is_none());
    }
}
