//! WebFinger discovery proxy that resolves OpenID Connect endpoints from an identity provider and
//! serves them from a single-key TTL cache.

#![deny(clippy::all, missing_docs)]

pub mod cache;
pub mod config;
pub mod discovery;
pub mod http;
pub mod metrics;
pub mod resolver;
pub mod security;
pub mod server;
pub mod webfinger;

mod error;
mod _prelude {
	pub use std::{sync::Arc, time::Duration};

	pub use chrono::{DateTime, Utc};
	pub use tokio::time::Instant;

	pub use crate::{Error, Result};
}

#[cfg(feature = "prometheus")] pub use crate::metrics::install_exporter;
pub use crate::{
	config::{JitterStrategy, ProxySettings, RetryPolicy},
	discovery::IdentityProviderConfig,
	error::{Error, ErrorClass, Result, UpstreamError},
	resolver::EndpointResolver,
	server::{AppState, router, serve},
	webfinger::{HealthReport, Link, WebFingerResponse},
};
