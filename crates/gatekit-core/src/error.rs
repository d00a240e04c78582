// Error taxonomy shared across the workspace.
//
// ApiError carries an HTTP status plus a stable machine-readable code; it is
// what handlers return to the transport layer. AuthError is the internal
// (non-HTTP) error used for configuration and infrastructure failures.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable machine-readable error codes returned in API error bodies.
///
/// Serialized in SCREAMING_SNAKE_CASE; clients match on these, so variants
/// are append-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    UserNotFound,
    FailedToCreateUser,
    FailedToCreateSession,
    FailedToGetSession,
    SessionNotFound,
    SessionExpired,
    InvalidEmailOrPassword,
    InvalidToken,
    ProviderNotFound,
    AccountNotFound,
    FailedToGetUserInfo,
    FailedToLinkAccount,
    AccountAlreadyLinked,
    SignupDisabled,
    CallbackUrlRequired,
    InvalidCallbackUrl,
    InvalidErrorCallbackUrl,
    InvalidNewUserCallbackUrl,
    InvalidRedirectUrl,
    InvalidOrigin,
    InvalidState,
    StateExpired,
    CouldNotRefreshAccessToken,
    CouldNotParseBody,
    ProviderAlreadyRegistered,
    InvalidIssuer,
    Unauthorized,
    Forbidden,
    RateLimitExceeded,
    InternalServerError,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::UserNotFound => "User not found",
            Self::FailedToCreateUser => "Failed to create user",
            Self::FailedToCreateSession => "Failed to create session",
            Self::FailedToGetSession => "Failed to get session",
            Self::SessionNotFound => "Session not found",
            Self::SessionExpired => "Session expired",
            Self::InvalidEmailOrPassword => "Invalid email or password",
            Self::InvalidToken => "Invalid token",
            Self::ProviderNotFound => "Provider not found",
            Self::AccountNotFound => "Account not found",
            Self::FailedToGetUserInfo => "Failed to get user info",
            Self::FailedToLinkAccount => "Failed to link account",
            Self::AccountAlreadyLinked => "Account already linked to another user",
            Self::SignupDisabled => "Signup disabled",
            Self::CallbackUrlRequired => "Callback URL is required",
            Self::InvalidCallbackUrl => "Invalid callback URL",
            Self::InvalidErrorCallbackUrl => "Invalid error callback URL",
            Self::InvalidNewUserCallbackUrl => "Invalid new user callback URL",
            Self::InvalidRedirectUrl => "Invalid redirect URL",
            Self::InvalidOrigin => "Invalid origin",
            Self::InvalidState => "Invalid state",
            Self::StateExpired => "State expired",
            Self::CouldNotRefreshAccessToken => "Could not refresh access token",
            Self::CouldNotParseBody => "Could not parse body",
            Self::ProviderAlreadyRegistered => "Provider already registered",
            Self::InvalidIssuer => "Invalid issuer",
            Self::Unauthorized => "Unauthorized",
            Self::Forbidden => "Forbidden",
            Self::RateLimitExceeded => "Rate limit exceeded",
            Self::InternalServerError => "Internal server error",
        };
        write!(f, "{msg}")
    }
}

/// HTTP status codes used by the API error system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpStatus {
    Ok = 200,
    Found = 302,
    SeeOther = 303,
    BadRequest = 400,
    Unauthorized = 401,
    Forbidden = 403,
    NotFound = 404,
    Conflict = 409,
    UnprocessableEntity = 422,
    TooManyRequests = 429,
    InternalServerError = 500,
    BadGateway = 502,
}

impl HttpStatus {
    pub fn status_code(&self) -> u16 {
        *self as u16
    }
}

impl fmt::Display for HttpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.status_code())
    }
}

/// API error with an HTTP status, a stable code, and a human-readable message.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{status} {code}: {message}")]
pub struct ApiError {
    pub status: HttpStatus,
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: HttpStatus, code: ErrorCode) -> Self {
        Self {
            message: code.to_string(),
            status,
            code,
        }
    }

    pub fn with_message(status: HttpStatus, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(code: ErrorCode) -> Self {
        Self::new(HttpStatus::BadRequest, code)
    }

    pub fn unauthorized(code: ErrorCode) -> Self {
        Self::new(HttpStatus::Unauthorized, code)
    }

    pub fn forbidden(code: ErrorCode) -> Self {
        Self::new(HttpStatus::Forbidden, code)
    }

    pub fn not_found(code: ErrorCode) -> Self {
        Self::new(HttpStatus::NotFound, code)
    }

    pub fn conflict(code: ErrorCode) -> Self {
        Self::new(HttpStatus::Conflict, code)
    }

    /// Upstream integration failure (IdP discovery/token/userinfo fetch).
    /// Distinguished from local validation errors as a gateway-class status.
    pub fn bad_gateway(code: ErrorCode) -> Self {
        Self::new(HttpStatus::BadGateway, code)
    }

    pub fn internal(code: ErrorCode) -> Self {
        Self::new(HttpStatus::InternalServerError, code)
    }

    /// Build a JSON body for the error response.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "code": self.code,
            "message": self.message,
        })
    }
}

/// Internal (non-HTTP) error used for configuration errors, crypto failures,
/// and infrastructure faults that are not client-visible.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Plugin error: {0}")]
    Plugin(String),

    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Unified result type for gatekit operations.
pub type Result<T> = std::result::Result<T, AuthError>;
