// Async lifecycle hooks. Plugins and applications register callbacks around
// auth events; `before` hooks may rewrite the payload or cancel the
// operation, `after` hooks are fire-and-forget.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

/// The kind of auth event that triggered a hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookEvent {
    BeforeSessionCreate,
    AfterSessionCreate,
    BeforeSignIn,
    AfterSignIn,
    BeforeSignOut,
    AfterSignOut,
    /// Fires before a new user is created through an OAuth callback.
    BeforeOAuthSignUp,
    AfterOAuthSignUp,
    /// Fires after an account link is created for an existing user.
    AfterAccountLink,
}

impl HookEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BeforeSessionCreate => "before_session_create",
            Self::AfterSessionCreate => "after_session_create",
            Self::BeforeSignIn => "before_sign_in",
            Self::AfterSignIn => "after_sign_in",
            Self::BeforeSignOut => "before_sign_out",
            Self::AfterSignOut => "after_sign_out",
            Self::BeforeOAuthSignUp => "before_oauth_sign_up",
            Self::AfterOAuthSignUp => "after_oauth_sign_up",
            Self::AfterAccountLink => "after_account_link",
        }
    }
}

/// An async hook registered around auth events.
#[async_trait]
pub trait AsyncHook: Send + Sync {
    /// Called when an event fires. `data` is the event-specific JSON payload.
    ///
    /// For "before" events, return `HookResult::Cancel` to abort or
    /// `HookResult::Continue(modified)` to proceed. For "after" events the
    /// return value is ignored.
    async fn on_event(&self, event: HookEvent, data: &Value) -> HookResult;
}

/// The result of a hook execution.
#[derive(Debug, Clone)]
pub enum HookResult {
    Continue(Option<Value>),
    Cancel(Option<String>),
}

impl HookResult {
    pub fn ok() -> Self {
        Self::Continue(None)
    }

    pub fn with_data(data: Value) -> Self {
        Self::Continue(Some(data))
    }

    pub fn cancel(reason: impl Into<String>) -> Self {
        Self::Cancel(Some(reason.into()))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancel(_))
    }
}

/// Registry of async hooks. Hooks run in registration order, which follows
/// plugin declaration order.
#[derive(Clone, Default)]
pub struct AsyncHookRegistry {
    hooks: Vec<(HookEvent, Arc<dyn AsyncHook>)>,
}

impl std::fmt::Debug for AsyncHookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncHookRegistry")
            .field("hook_count", &self.hooks.len())
            .finish()
    }
}

impl AsyncHookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, event: HookEvent, hook: Arc<dyn AsyncHook>) {
        self.hooks.push((event, hook));
    }

    /// Run all hooks for a "before" event in registration order. Stops at the
    /// first cancellation; data modifications chain through.
    pub async fn run_before(&self, event: HookEvent, data: &Value) -> HookResult {
        let mut current = data.clone();
        for (hook_event, hook) in &self.hooks {
            if *hook_event != event {
                continue;
            }
            match hook.on_event(event, &current).await {
                HookResult::Continue(Some(modified)) => current = modified,
                HookResult::Continue(None) => {}
                cancel @ HookResult::Cancel(_) => return cancel,
            }
        }
        HookResult::Continue(Some(current))
    }

    /// Run all hooks for an "after" event. Results are ignored.
    pub async fn run_after(&self, event: HookEvent, data: &Value) {
        for (hook_event, hook) in &self.hooks {
            if *hook_event == event {
                let _ = hook.on_event(event, data).await;
            }
        }
    }
}
