//! TTL cache for the identity provider configuration.

pub mod entry;
pub mod manager;
pub mod state;
