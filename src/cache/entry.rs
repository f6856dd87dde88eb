//! Cache entry definitions and state management helpers.

// self
use crate::{
	_prelude::*,
	UpstreamError,
	cache::state::{CachePayload, CacheState},
};

/// The single cached configuration slot.
///
/// `generation` advances on every completed fetch, success or failure, which lets callers that
/// queued behind an in-flight fetch recognise that its outcome is already available.
#[derive(Clone, Debug)]
pub struct CacheEntry {
	state: CacheState,
	generation: u64,
}
impl CacheEntry {
	/// Create a new empty cache entry.
	pub fn new() -> Self {
		Self { state: CacheState::Empty, generation: 0 }
	}

	/// Inspect the current cache state.
	pub fn state(&self) -> &CacheState {
		&self.state
	}

	/// Number of fetch outcomes recorded so far.
	pub fn generation(&self) -> u64 {
		self.generation
	}

	/// Return the payload when it is still within `ttl` at `now`.
	pub fn fresh(&self, now: Instant, ttl: Duration) -> Option<&CachePayload> {
		self.state.payload().filter(|payload| !payload.is_stale(now, ttl))
	}

	/// Record a successful fetch, replacing any previous payload.
	pub fn store(&mut self, payload: CachePayload) {
		self.state = CacheState::Ready(payload);
		self.generation = self.generation.wrapping_add(1);
	}

	/// Record a failed fetch; the previous payload is dropped rather than kept as a fallback.
	pub fn record_failure(&mut self, error: UpstreamError) {
		self.state = CacheState::Failed(error);
		self.generation = self.generation.wrapping_add(1);
	}

	/// Retrieve a clone of the cached payload if present.
	pub fn snapshot(&self) -> Option<CachePayload> {
		self.state.payload().cloned()
	}
}
impl Default for CacheEntry {
	fn default() -> Self {
		Self::new()
	}
}
