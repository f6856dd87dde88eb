//! Proxy settings, retry configuration, and startup validation.

// std
use std::cell::RefCell;
// crates.io
use rand::{Rng, SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use url::Url;
// self
use crate::{_prelude::*, security};

thread_local! {
	static SMALL_RNG: RefCell<SmallRng> = RefCell::new(SmallRng::from_rng(&mut rand::rng()));
}

/// Default identity provider domain.
pub const DEFAULT_DOMAIN: &str = "idp.example.com";
/// Default application slug on the identity provider.
pub const DEFAULT_APPLICATION: &str = "tailscale";
/// Default time-to-live of the cached configuration.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
/// Default per-attempt upstream timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Smallest per-attempt timeout accepted.
pub const MIN_REQUEST_TIMEOUT: Duration = Duration::from_millis(100);

/// Supported jitter strategies for retry policies.
#[derive(Clone, Debug, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
	/// No jitter; deterministic backoff schedule.
	#[default]
	None,
	/// Full jitter; randomize delay between 80% and 100% of the current backoff.
	Full,
}

/// Retry configuration for the upstream fetch.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryPolicy {
	/// Maximum number of retry attempts to perform after the initial request.
	pub max_retries: u32,
	/// Timeout applied to each individual HTTP attempt.
	pub attempt_timeout: Duration,
	/// Initial delay before retrying after a failure.
	pub initial_backoff: Duration,
	/// Upper bound applied to exponential backoff growth.
	pub max_backoff: Duration,
	/// Strategy used to randomize the computed backoff.
	#[serde(default)]
	pub jitter: JitterStrategy,
}
impl RetryPolicy {
	/// Validate invariants for retry configuration.
	pub fn validate(&self) -> Result<()> {
		if self.attempt_timeout < MIN_REQUEST_TIMEOUT {
			return Err(Error::Validation {
				field: "retry_policy.attempt_timeout",
				reason: "Must be at least 100 ms.".into(),
			});
		}
		if self.initial_backoff.is_zero() {
			return Err(Error::Validation {
				field: "retry_policy.initial_backoff",
				reason: "Must be greater than zero.".into(),
			});
		}
		if self.max_backoff < self.initial_backoff {
			return Err(Error::Validation {
				field: "retry_policy.max_backoff",
				reason: "Must be greater than or equal to initial_backoff.".into(),
			});
		}

		Ok(())
	}

	/// Total number of attempts, including the initial request.
	pub fn max_attempts(&self) -> u32 {
		self.max_retries.saturating_add(1)
	}

	/// Compute the delay before retry number `attempt` (zero-based).
	pub fn compute_backoff(&self, attempt: u32) -> Duration {
		let exponent = attempt.min(32);
		let base = self.initial_backoff.mul_f64(2f64.powi(exponent as i32));
		let bounded = base.min(self.max_backoff).max(self.initial_backoff);

		match self.jitter {
			JitterStrategy::None => bounded,
			JitterStrategy::Full => {
				let lower = bounded.mul_f64(0.8).max(self.initial_backoff);

				random_within(lower, bounded)
			},
		}
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_retries: 2,
			attempt_timeout: DEFAULT_REQUEST_TIMEOUT,
			initial_backoff: Duration::from_secs(1),
			max_backoff: Duration::from_secs(30),
			jitter: JitterStrategy::None,
		}
	}
}

/// Everything the proxy needs to know about its single upstream target.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProxySettings {
	/// Identity provider domain, canonicalised.
	pub domain: String,
	/// Application slug whose configuration is published.
	pub application: String,
	/// Configuration endpoint queried on a cache miss.
	pub upstream_url: Url,
	/// Whether HTTPS is required for the upstream URL.
	pub require_https: bool,
	/// Time-to-live of the cached configuration.
	pub cache_ttl: Duration,
	/// Retry policy for upstream attempts.
	#[serde(default)]
	pub retry_policy: RetryPolicy,
}
impl ProxySettings {
	/// Construct settings for `domain`/`application` with default cache and retry behaviour.
	pub fn new(domain: impl AsRef<str>, application: impl Into<String>) -> Result<Self> {
		let domain = security::canonicalize_dns_name(domain.as_ref()).ok_or_else(|| {
			Error::Validation { field: "domain", reason: "Must not be empty.".into() }
		})?;
		let application = application.into();

		security::validate_domain(&domain)?;
		validate_application_name(&application)?;

		let upstream_url = upstream_url(&domain, &application)?;

		Ok(Self {
			domain,
			application,
			upstream_url,
			require_https: true,
			cache_ttl: DEFAULT_CACHE_TTL,
			retry_policy: RetryPolicy::default(),
		})
	}

	/// Replace the derived upstream URL.
	pub fn with_upstream_url(mut self, url: Url) -> Self {
		self.upstream_url = url;

		self
	}

	/// Set HTTPS requirement to the desired value.
	pub fn with_require_https(mut self, require_https: bool) -> Self {
		self.require_https = require_https;

		self
	}

	/// Set the cache time-to-live.
	pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
		self.cache_ttl = ttl;

		self
	}

	/// Set the per-attempt upstream timeout.
	pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
		self.retry_policy.attempt_timeout = timeout;

		self
	}

	/// Replace the retry policy wholesale.
	pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
		self.retry_policy = policy;

		self
	}

	/// Validate the settings against the documented constraints.
	pub fn validate(&self) -> Result<()> {
		validate_application_name(&self.application)?;

		if self.require_https {
			security::enforce_https(&self.upstream_url)?;
		}
		if self.cache_ttl.is_zero() {
			return Err(Error::Validation {
				field: "cache_ttl",
				reason: "Must be greater than zero.".into(),
			});
		}

		self.retry_policy.validate()
	}
}

/// Check that an application slug matches `^[a-zA-Z0-9_-]+$`.
pub fn validate_application_name(value: &str) -> Result<()> {
	if value.is_empty() {
		return Err(Error::Validation {
			field: "application",
			reason: "Invalid application name: must not be empty.".into(),
		});
	}
	if value.len() > 64 {
		return Err(Error::Validation {
			field: "application",
			reason: "Invalid application name: must be 64 characters or fewer.".into(),
		});
	}
	if !value.as_bytes().iter().all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_')) {
		return Err(Error::Validation {
			field: "application",
			reason: format!(
				"Invalid application name '{value}': may only contain ASCII letters, numbers, '-', or '_'."
			),
		});
	}

	Ok(())
}

/// Build the identity provider configuration URL for an application.
pub fn upstream_url(domain: &str, application: &str) -> Result<Url> {
	Ok(Url::parse(&format!("https://{domain}/application/o/{application}/"))?)
}

fn random_within(min: Duration, max: Duration) -> Duration {
	if max <= min {
		return max;
	}
	SMALL_RNG.with(|cell| {
		let mut rng = cell.borrow_mut();
		let nanos = max.as_nanos() - min.as_nanos();
		let jitter = rng.random_range(0..=nanos.min(u64::MAX as u128));

		min + Duration::from_nanos(jitter as u64)
	})
}
