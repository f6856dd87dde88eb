//! Endpoint resolution: upstream fetch and validation behind the TTL cache.

// crates.io
use reqwest::Client;
// self
use crate::{
	_prelude::*,
	UpstreamError,
	cache::{manager::CacheManager, state::CachePayload},
	config::ProxySettings,
	discovery,
	http::client::UpstreamClient,
};

/// Resolves the identity provider configuration for the process-wide upstream target.
#[derive(Clone, Debug)]
pub struct EndpointResolver {
	settings: Arc<ProxySettings>,
	upstream: UpstreamClient,
	cache: CacheManager,
}
impl EndpointResolver {
	/// Build a resolver with the default reqwest client after validating `settings`.
	pub fn new(settings: ProxySettings) -> Result<Self> {
		settings.validate()?;

		let upstream = UpstreamClient::new(settings.retry_policy.clone())?;

		Ok(Self::with_parts(settings, upstream))
	}

	/// Build a resolver using the supplied HTTP client (primarily for tests).
	pub fn with_client(settings: ProxySettings, client: Client) -> Result<Self> {
		settings.validate()?;

		let upstream = UpstreamClient::with_client(client, settings.retry_policy.clone());

		Ok(Self::with_parts(settings, upstream))
	}

	fn with_parts(settings: ProxySettings, upstream: UpstreamClient) -> Self {
		let cache = CacheManager::new(
			settings.upstream_url.clone(),
			&settings.application,
			settings.cache_ttl,
		);

		Self { settings: Arc::new(settings), upstream, cache }
	}

	/// Settings the resolver was built with.
	pub fn settings(&self) -> &ProxySettings {
		&self.settings
	}

	/// Underlying TTL cache.
	pub fn cache(&self) -> &CacheManager {
		&self.cache
	}

	/// Return the cached configuration, fetching and validating it on a miss.
	pub async fn resolve(&self) -> std::result::Result<CachePayload, UpstreamError> {
		let upstream = self.upstream.clone();
		let url = self.settings.upstream_url.clone();

		self.cache
			.get(move || async move {
				let raw = upstream.fetch(&url).await?;

				discovery::validate(&raw).inspect_err(|err| {
					tracing::warn!(url = %url, error = %err, "upstream configuration rejected");
				})
			})
			.await
	}
}
