//! Cache state machine modelling the configuration lifecycle.

// self
use crate::{_prelude::*, UpstreamError, discovery::IdentityProviderConfig};

/// Validated configuration together with the moment it was fetched.
///
/// Replaced wholesale on every successful refetch, never mutated in place.
#[derive(Clone, Debug)]
pub struct CachePayload {
	/// Configuration document retained for the identity provider.
	pub config: Arc<IdentityProviderConfig>,
	/// Monotonic instant the payload was fetched.
	pub fetched_at: Instant,
	/// UTC timestamp aligned with `fetched_at`.
	pub fetched_at_utc: DateTime<Utc>,
}
impl CachePayload {
	/// Wrap a freshly validated configuration fetched at `now`.
	pub fn new(config: Arc<IdentityProviderConfig>, now: Instant) -> Self {
		Self { config, fetched_at: now, fetched_at_utc: Utc::now() }
	}

	/// Time elapsed since the payload was fetched.
	pub fn age(&self, now: Instant) -> Duration {
		now.saturating_duration_since(self.fetched_at)
	}

	/// Whether the payload has reached the end of its time-to-live.
	pub fn is_stale(&self, now: Instant, ttl: Duration) -> bool {
		self.age(now) >= ttl
	}
}

/// Cache lifecycle states.
#[derive(Clone, Debug)]
pub enum CacheState {
	/// Cache has no payload.
	Empty,
	/// Payload is available, fresh or not.
	Ready(CachePayload),
	/// The most recent fetch failed; the previous payload was discarded.
	Failed(UpstreamError),
}
impl CacheState {
	/// Retrieve the current payload if available.
	pub fn payload(&self) -> Option<&CachePayload> {
		match self {
			CacheState::Ready(payload) => Some(payload),
			_ => None,
		}
	}

	/// Whether a payload is present.
	pub fn is_usable(&self) -> bool {
		matches!(self, CacheState::Ready(_))
	}
}
