#![doc = include_str!("../README.md")]

pub mod context;
pub mod cookies;
pub mod crypto;
pub mod internal_adapter;
pub mod oauth;
pub mod plugin_runtime;
pub mod plugins;
pub mod routes;

pub use context::AuthContext;
pub use internal_adapter::{AdapterError, InternalAdapter, StoreAdapter};

// Re-export the core crate so downstream users need only one dependency.
pub use gatekit_core as core;
