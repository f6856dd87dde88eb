//! Cache telemetry: in-process counters and optional `metrics` emission.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
#[cfg(feature = "metrics")] use metrics::Label;
#[cfg(feature = "prometheus")]
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
#[cfg(feature = "metrics")] use smallvec::SmallVec;
// self
use crate::_prelude::*;

#[cfg(feature = "metrics")]
type LabelSet = SmallVec<[Label; 2]>;

#[cfg(feature = "metrics")]
const METRIC_LOOKUPS_TOTAL: &str = "webfinger_cache_requests_total";
#[cfg(feature = "metrics")]
const METRIC_HITS_TOTAL: &str = "webfinger_cache_hits_total";
#[cfg(feature = "metrics")]
const METRIC_MISSES_TOTAL: &str = "webfinger_cache_misses_total";
#[cfg(feature = "metrics")]
const METRIC_COALESCED_TOTAL: &str = "webfinger_cache_coalesced_total";
#[cfg(feature = "metrics")]
const METRIC_REFRESH_TOTAL: &str = "webfinger_cache_refresh_total";
#[cfg(feature = "metrics")]
const METRIC_REFRESH_DURATION: &str = "webfinger_cache_refresh_duration_seconds";
#[cfg(feature = "metrics")]
const METRIC_REFRESH_ERRORS: &str = "webfinger_cache_refresh_errors_total";

/// How a single cache lookup was answered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lookup {
	/// A fresh payload was already cached.
	Hit,
	/// The caller waited on a fetch another caller started and took its outcome.
	Coalesced,
	/// The caller ran the upstream fetch itself.
	Miss,
}

/// Counters for the configuration cache, shared by every clone of the cache handle.
#[derive(Debug, Default)]
pub struct CacheMetrics {
	hits: AtomicU64,
	coalesced: AtomicU64,
	misses: AtomicU64,
	fetch_successes: AtomicU64,
	fetch_failures: AtomicU64,
	last_fetch_micros: AtomicU64,
}
impl CacheMetrics {
	/// Create an empty accumulator.
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	/// Count one answered lookup.
	pub fn record_lookup(&self, lookup: Lookup) {
		let counter = match lookup {
			Lookup::Hit => &self.hits,
			Lookup::Coalesced => &self.coalesced,
			Lookup::Miss => &self.misses,
		};

		counter.fetch_add(1, Ordering::Relaxed);
	}

	/// Count a fetch that produced a valid configuration.
	pub fn record_fetch_success(&self, duration: Duration) {
		self.fetch_successes.fetch_add(1, Ordering::Relaxed);
		self.last_fetch_micros.store(duration.as_micros() as u64, Ordering::Relaxed);
	}

	/// Count a fetch that ended in an upstream error.
	pub fn record_fetch_failure(&self) {
		self.fetch_failures.fetch_add(1, Ordering::Relaxed);
	}

	/// Point-in-time copy of the counters.
	pub fn snapshot(&self) -> CacheStats {
		CacheStats {
			hits: self.hits.load(Ordering::Relaxed),
			coalesced: self.coalesced.load(Ordering::Relaxed),
			misses: self.misses.load(Ordering::Relaxed),
			fetch_successes: self.fetch_successes.load(Ordering::Relaxed),
			fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
			last_fetch_micros: match self.last_fetch_micros.load(Ordering::Relaxed) {
				0 => None,
				value => Some(value),
			},
		}
	}
}

/// Snapshot of [`CacheMetrics`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
	/// Lookups answered from a fresh payload.
	pub hits: u64,
	/// Lookups answered by a fetch another caller started.
	pub coalesced: u64,
	/// Lookups that started an upstream fetch.
	pub misses: u64,
	/// Upstream fetches that produced a valid configuration.
	pub fetch_successes: u64,
	/// Upstream fetches that failed after retries or validation.
	pub fetch_failures: u64,
	/// Duration of the most recent successful fetch, in microseconds.
	pub last_fetch_micros: Option<u64>,
}
impl CacheStats {
	/// Every lookup the cache answered.
	pub fn lookups(&self) -> u64 {
		self.hits + self.coalesced + self.misses
	}

	/// Upstream fetches that ran to completion.
	pub fn upstream_fetches(&self) -> u64 {
		self.fetch_successes + self.fetch_failures
	}

	/// Share of lookups answered without a fetch of their own.
	pub fn hit_rate(&self) -> f64 {
		match self.lookups() {
			0 => 0.0,
			total => (self.hits + self.coalesced) as f64 / total as f64,
		}
	}
}

/// Install the Prometheus recorder and return the handle that renders it.
#[cfg(feature = "prometheus")]
pub fn install_exporter() -> Result<PrometheusHandle> {
	PrometheusBuilder::new().install_recorder().map_err(|err| Error::Metrics(err.to_string()))
}

/// Emit the `metrics` counters for one answered lookup.
pub fn record_lookup(application: &str, lookup: Lookup) {
	#[cfg(feature = "metrics")]
	{
		let labels = base_labels(application);
		let name = match lookup {
			Lookup::Hit => METRIC_HITS_TOTAL,
			Lookup::Coalesced => METRIC_COALESCED_TOTAL,
			Lookup::Miss => METRIC_MISSES_TOTAL,
		};

		metrics::counter!(METRIC_LOOKUPS_TOTAL, labels.iter()).increment(1);
		metrics::counter!(name, labels.iter()).increment(1);
	}
	#[cfg(not(feature = "metrics"))]
	let _ = (application, lookup);
}

/// Emit a successful fetch along with its latency.
pub fn record_fetch_success(application: &str, duration: Duration) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(METRIC_REFRESH_TOTAL, status_labels(application, "success").iter())
			.increment(1);
		metrics::histogram!(METRIC_REFRESH_DURATION, base_labels(application).iter())
			.record(duration.as_secs_f64());
	}
	#[cfg(not(feature = "metrics"))]
	let _ = (application, duration);
}

/// Emit a failed fetch.
pub fn record_fetch_failure(application: &str) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(METRIC_REFRESH_TOTAL, status_labels(application, "error").iter())
			.increment(1);
		metrics::counter!(METRIC_REFRESH_ERRORS, base_labels(application).iter()).increment(1);
	}
	#[cfg(not(feature = "metrics"))]
	let _ = application;
}

#[cfg(feature = "metrics")]
fn base_labels(application: &str) -> LabelSet {
	let mut labels = LabelSet::new();

	labels.push(Label::new("application", application.to_owned()));

	labels
}

#[cfg(feature = "metrics")]
fn status_labels(application: &str, status: &'static str) -> LabelSet {
	let mut labels = base_labels(application);

	labels.push(Label::new("status", status));

	labels
}
