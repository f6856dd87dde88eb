//! Retry utilities for HTTP requests.

// crates.io
use tokio::time;
// self
use crate::{_prelude::*, config::RetryPolicy};

/// Controls retry backoff progression and attempt counting.
#[derive(Debug)]
pub struct RetryExecutor<'a> {
	policy: &'a RetryPolicy,
	retries_used: u32,
}
impl<'a> RetryExecutor<'a> {
	/// Create a new executor respecting the supplied retry policy.
	pub fn new(policy: &'a RetryPolicy) -> Self {
		Self { policy, retries_used: 0 }
	}

	/// Whether another retry is permitted under the policy.
	pub fn can_retry(&self) -> bool {
		self.retries_used < self.policy.max_retries
	}

	/// Number of retries that have already been consumed.
	pub fn attempts_used(&self) -> u32 {
		self.retries_used
	}

	/// Timeout allocated to each attempt.
	pub fn attempt_timeout(&self) -> Duration {
		self.policy.attempt_timeout
	}

	/// Advance retry state and compute the backoff delay for the next attempt.
	pub fn next_backoff(&mut self) -> Option<Duration> {
		if !self.can_retry() {
			tracing::debug!(attempt = self.retries_used, "retry budget exhausted");

			return None;
		}

		let attempt = self.retries_used;

		self.retries_used = self.retries_used.saturating_add(1);

		let delay = self.policy.compute_backoff(attempt);

		tracing::debug!(attempt = attempt + 1, ?delay, "retry backoff computed");

		Some(delay)
	}

	/// Consume one retry and sleep for its backoff window; returns at once when exhausted.
	pub async fn sleep_backoff(&mut self) {
		if let Some(delay) = self.next_backoff().filter(|delay| !delay.is_zero()) {
			time::sleep(delay).await;
		}
	}
}
