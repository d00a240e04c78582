pub mod adapter;
pub mod models;
pub mod schema;
pub mod secondary_storage;
