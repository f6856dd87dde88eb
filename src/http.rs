//! HTTP helpers for identity provider configuration retrieval.

pub mod client;
pub mod retry;
