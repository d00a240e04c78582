#![doc = include_str!("../README.md")]

pub mod db;
pub mod error;
pub mod hooks;
pub mod logger;
pub mod options;
pub mod plugin;
pub mod utils;

// Re-exports for convenience
pub use db::adapter::Adapter;
pub use db::models::{Account, Session, User, Verification};
pub use db::secondary_storage::{MemorySecondaryStorage, SecondaryStorage};
pub use error::{ApiError, AuthError, ErrorCode};
pub use hooks::{AsyncHook, AsyncHookRegistry, HookEvent, HookResult};
pub use logger::{AuthLogger, LogHandler, LogLevel, LoggerConfig};
pub use options::AuthOptions;
pub use plugin::AuthPlugin;
