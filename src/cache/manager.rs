//! Cache manager guarding the upstream configuration fetch.

// std
use std::future::Future;
// crates.io
use tokio::sync::{Mutex, RwLock};
use url::Url;
// self
use crate::{
	_prelude::*,
	UpstreamError,
	cache::{
		entry::CacheEntry,
		state::{CachePayload, CacheState},
	},
	discovery::IdentityProviderConfig,
	metrics::{self, CacheMetrics, Lookup},
};

/// Single-key TTL cache around the identity provider configuration.
///
/// Concurrent misses are coalesced: one caller runs the fetch on a detached task while the rest
/// wait on the single-flight guard and then read that fetch's outcome. The entry lock is only taken
/// to read or swap the payload, never across the network call.
#[derive(Clone, Debug)]
pub struct CacheManager {
	key: Arc<Url>,
	application: Arc<str>,
	ttl: Duration,
	entry: Arc<RwLock<CacheEntry>>,
	single_flight: Arc<Mutex<()>>,
	metrics: Arc<CacheMetrics>,
}
impl CacheManager {
	/// Build an empty cache for the configuration at `key`, labelled by `application`, whose
	/// entries live for `ttl`.
	pub fn new(key: Url, application: &str, ttl: Duration) -> Self {
		Self {
			key: Arc::new(key),
			application: Arc::from(application),
			ttl,
			entry: Arc::new(RwLock::new(CacheEntry::new())),
			single_flight: Arc::new(Mutex::new(())),
			metrics: CacheMetrics::new(),
		}
	}

	/// Access the per-cache metrics accumulator.
	pub fn metrics(&self) -> Arc<CacheMetrics> {
		self.metrics.clone()
	}

	/// Current payload, fresh or stale, without triggering a fetch.
	pub async fn snapshot(&self) -> Option<CachePayload> {
		self.entry.read().await.snapshot()
	}

	/// Age of the cached payload, `None` when nothing is cached.
	pub async fn age(&self) -> Option<Duration> {
		self.snapshot().await.map(|payload| payload.age(Instant::now()))
	}

	/// Return the cached configuration while fresh, otherwise run `fetch` and store its result.
	///
	/// Failures are propagated unchanged and leave the cache empty; a stale payload is never
	/// served in place of a failed refresh.
	#[tracing::instrument(skip(self, fetch), fields(upstream = %self.key))]
	pub async fn get<F, Fut>(&self, fetch: F) -> std::result::Result<CachePayload, UpstreamError>
	where
		F: FnOnce() -> Fut + Send + 'static,
		Fut: Future<Output = std::result::Result<IdentityProviderConfig, UpstreamError>>
			+ Send
			+ 'static,
	{
		let observed = {
			let entry = self.entry.read().await;
			let now = Instant::now();

			if let Some(payload) = entry.fresh(now, self.ttl) {
				tracing::debug!(age = ?payload.age(now), "cache hit");

				self.observe_lookup(Lookup::Hit);

				return Ok(payload.clone());
			}

			entry.generation()
		};
		let guard = self.single_flight.clone().lock_owned().await;

		{
			let entry = self.entry.read().await;

			if entry.generation() != observed {
				match entry.state() {
					CacheState::Ready(payload) => {
						tracing::debug!("served by concurrent fetch");

						self.observe_lookup(Lookup::Coalesced);

						return Ok(payload.clone());
					},
					CacheState::Failed(err) => {
						tracing::debug!(error = %err, "concurrent fetch failed");

						self.observe_lookup(Lookup::Coalesced);

						return Err(err.clone());
					},
					CacheState::Empty => {},
				}
			}
		}

		tracing::debug!("cache miss; fetching upstream");

		self.observe_lookup(Lookup::Miss);

		let manager = self.clone();
		let task = tokio::spawn(async move {
			let _guard = guard;

			manager.refresh(fetch).await
		});

		match task.await {
			Ok(outcome) => outcome,
			Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
			Err(err) => Err(UpstreamError::ConnectionFailure {
				url: (*self.key).clone(),
				reason: format!("Refresh task did not complete: {err}."),
			}),
		}
	}

	async fn refresh<F, Fut>(&self, fetch: F) -> std::result::Result<CachePayload, UpstreamError>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = std::result::Result<IdentityProviderConfig, UpstreamError>>,
	{
		let started = Instant::now();
		let outcome = fetch().await;
		let mut entry = self.entry.write().await;

		match outcome {
			Ok(config) => {
				let payload = CachePayload::new(Arc::new(config), Instant::now());

				entry.store(payload.clone());
				self.observe_fetch_success(started.elapsed());

				tracing::debug!(fetched_at = %payload.fetched_at_utc, "cache entry replaced");

				Ok(payload)
			},
			Err(err) => {
				entry.record_failure(err.clone());
				self.observe_fetch_failure();

				Err(err)
			},
		}
	}

	fn observe_lookup(&self, lookup: Lookup) {
		metrics::record_lookup(&self.application, lookup);

		self.metrics.record_lookup(lookup);
	}

	fn observe_fetch_success(&self, duration: Duration) {
		metrics::record_fetch_success(&self.application, duration);

		self.metrics.record_fetch_success(duration);
	}

	fn observe_fetch_failure(&self) {
		metrics::record_fetch_failure(&self.application);

		self.metrics.record_fetch_failure();
	}
}
