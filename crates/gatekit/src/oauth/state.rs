// OAuth state management: CSRF binding plus the callback data the flow
// needs when the provider redirects back.
//
// State lives in the verification table keyed by the random state value and
// is consumed with an atomic take, so a replayed callback always fails.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::context::AuthContext;

/// Data bound to an in-flight sign-in attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateData {
    pub provider_id: String,
    pub callback_url: String,
    #[serde(default)]
    pub error_url: Option<String>,
    #[serde(default)]
    pub new_user_url: Option<String>,
    /// PKCE verifier, present when the provider flow uses PKCE.
    #[serde(default)]
    pub code_verifier: Option<String>,
    /// Caller explicitly asked to create an account if none exists.
    #[serde(default)]
    pub request_sign_up: bool,
    /// Millisecond timestamp after which the state is dead.
    #[serde(default)]
    pub expires_at: i64,
    /// Link flow: attach the new account to this signed-in user.
    #[serde(default)]
    pub link: Option<LinkData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkData {
    pub user_id: String,
    pub email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateErrorCode {
    GenerationError,
    Invalid,
    /// Unknown, already-consumed, or cross-site state.
    Mismatch,
    Expired,
}

impl std::fmt::Display for StateErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GenerationError => write!(f, "state_generation_error"),
            Self::Invalid => write!(f, "state_invalid"),
            Self::Mismatch => write!(f, "state_mismatch"),
            Self::Expired => write!(f, "state_expired"),
        }
    }
}

#[derive(Debug)]
pub struct StateError {
    pub code: StateErrorCode,
    pub message: String,
}

impl std::fmt::Display for StateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for StateError {}

/// State TTL: the window between building the authorization URL and the
/// provider redirecting back.
const STATE_TTL_MINUTES: i64 = 10;

/// Generate and persist a new OAuth state. Returns the state value to embed
/// in the authorization URL.
pub async fn generate_state(
    ctx: &Arc<AuthContext>,
    mut state_data: StateData,
) -> Result<String, StateError> {
    let state = crate::crypto::random::generate_random_string(32);

    let expires_at = chrono::Utc::now() + chrono::TimeDelta::minutes(STATE_TTL_MINUTES);
    state_data.expires_at = expires_at.timestamp_millis();

    let value = serde_json::to_string(&state_data).map_err(|e| StateError {
        code: StateErrorCode::GenerationError,
        message: format!("Failed to serialize state: {e}"),
    })?;

    ctx.adapter
        .create_verification(&state, &value, expires_at)
        .await
        .map_err(|e| StateError {
            code: StateErrorCode::GenerationError,
            message: format!("Unable to persist state: {e}"),
        })?;

    Ok(state)
}

/// Consume and validate an OAuth state. The verification row is taken
/// atomically, so a second parse of the same value fails with Mismatch.
pub async fn parse_state(ctx: &Arc<AuthContext>, state: &str) -> Result<StateData, StateError> {
    let row = ctx
        .adapter
        .take_verification(state)
        .await
        .map_err(|e| StateError {
            code: StateErrorCode::Mismatch,
            message: format!("Failed to look up state: {e}"),
        })?
        .ok_or(StateError {
            code: StateErrorCode::Mismatch,
            message: "State mismatch: no pending sign-in for this value".into(),
        })?;

    let value = row["value"].as_str().unwrap_or("{}");
    let parsed: StateData = serde_json::from_str(value).map_err(|e| StateError {
        code: StateErrorCode::Invalid,
        message: format!("Failed to parse state data: {e}"),
    })?;

    if parsed.expires_at > 0 && parsed.expires_at < chrono::Utc::now().timestamp_millis() {
        return Err(StateError {
            code: StateErrorCode::Expired,
            message: "Sign-in attempt expired, restart the flow".into(),
        });
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_data_wire_shape() {
        let data = StateData {
            provider_id: "acme".into(),
            callback_url: "/dashboard".into(),
            error_url: Some("/login?failed=1".into()),
            new_user_url: None,
            code_verifier: Some("ver".into()),
            request_sign_up: true,
            expires_at: 1_700_000_000_000,
            link: Some(LinkData {
                user_id: "u1".into(),
                email: "a@b.test".into(),
            }),
        };

        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["providerId"], "acme");
        assert_eq!(json["callbackUrl"], "/dashboard");
        assert_eq!(json["requestSignUp"], true);
        assert_eq!(json["link"]["userId"], "u1");

        let round: StateData = serde_json::from_value(json).unwrap();
        assert_eq!(round.provider_id, "acme");
    }

    #[test]
    fn minimal_state_deserializes_with_defaults() {
        let parsed: StateData = serde_json::from_str(
            r#"{"providerId": "acme", "callbackUrl": "/"}"#,
        )
        .unwrap();
        assert!(!parsed.request_sign_up);
        assert!(parsed.code_verifier.is_none());
        assert_eq!(parsed.expires_at, 0);
    }

    #[test]
    fn error_codes_render() {
        assert_eq!(StateErrorCode::Mismatch.to_string(), "state_mismatch");
        assert_eq!(StateErrorCode::Expired.to_string(), "state_expired");
    }
}
