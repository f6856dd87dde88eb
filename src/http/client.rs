//! HTTP client integration for identity provider configuration retrieval.

// crates.io
use http::header::ACCEPT;
use reqwest::{Client, redirect::Policy};
use url::Url;
// self
use crate::{_prelude::*, UpstreamError, config::RetryPolicy, http::retry::RetryExecutor};

/// Maximum redirect depth.
pub const MAX_REDIRECTS: usize = 10;
/// Upper bound on the accepted configuration document size (1 MiB).
pub const MAX_RESPONSE_BYTES: usize = 1_048_576;

/// Stateless fetcher with bounded timeout and retry for transient failures.
#[derive(Clone, Debug)]
pub struct UpstreamClient {
	client: Client,
	retry_policy: RetryPolicy,
}
impl UpstreamClient {
	/// Build a client with the default reqwest configuration.
	pub fn new(retry_policy: RetryPolicy) -> Result<Self> {
		let client = Client::builder()
			.redirect(Policy::limited(MAX_REDIRECTS))
			.user_agent(format!("webfinger-proxy/{}", env!("CARGO_PKG_VERSION")))
			.connect_timeout(retry_policy.attempt_timeout)
			.build()?;

		Ok(Self::with_client(client, retry_policy))
	}

	/// Build an upstream client around the supplied reqwest client (primarily for tests).
	pub fn with_client(client: Client, retry_policy: RetryPolicy) -> Self {
		Self { client, retry_policy }
	}

	/// Fetch the raw body at `url`, retrying transient failures with exponential backoff.
	///
	/// The last failure is returned once the attempt budget is spent; no backoff follows the
	/// final attempt.
	#[tracing::instrument(skip(self, url), fields(url = %url))]
	pub async fn fetch(&self, url: &Url) -> std::result::Result<Vec<u8>, UpstreamError> {
		let mut executor = RetryExecutor::new(&self.retry_policy);

		loop {
			let attempt = executor.attempts_used() + 1;

			match fetch_once(&self.client, url, executor.attempt_timeout()).await {
				Ok(body) => return Ok(body),
				Err(err) if err.is_transient() && executor.can_retry() => {
					tracing::warn!(attempt, error = %err, "upstream attempt failed; retrying");

					executor.sleep_backoff().await;
				},
				Err(err) => {
					tracing::warn!(attempt, error = %err, "upstream fetch failed");

					return Err(err);
				},
			}
		}
	}
}

/// Perform a single GET against the configuration endpoint.
pub async fn fetch_once(
	client: &Client,
	url: &Url,
	attempt_timeout: Duration,
) -> std::result::Result<Vec<u8>, UpstreamError> {
	let start = Instant::now();
	let mut response = client
		.get(url.clone())
		.header(ACCEPT, "application/json")
		.timeout(attempt_timeout)
		.send()
		.await
		.map_err(|err| classify(url, err))?;
	let status = response.status();

	if !status.is_success() {
		return Err(UpstreamError::HttpStatus { status, url: url.clone() });
	}

	let declared = response.content_length().unwrap_or_default();

	if declared > MAX_RESPONSE_BYTES as u64 {
		return Err(oversized(declared));
	}

	let mut body = Vec::new();

	while let Some(chunk) = response.chunk().await.map_err(|err| classify(url, err))? {
		if body.len() + chunk.len() > MAX_RESPONSE_BYTES {
			return Err(oversized((body.len() + chunk.len()) as u64));
		}

		body.extend_from_slice(&chunk);
	}

	tracing::debug!(status = %status, elapsed = ?start.elapsed(), "upstream fetch complete");

	Ok(body)
}

fn oversized(size: u64) -> UpstreamError {
	UpstreamError::MalformedPayload(format!(
		"Response size {size} bytes exceeds the guard of {MAX_RESPONSE_BYTES} bytes."
	))
}

fn classify(url: &Url, err: reqwest::Error) -> UpstreamError {
	if err.is_timeout() {
		UpstreamError::Timeout { url: url.clone() }
	} else if let Some(status) = err.status() {
		UpstreamError::HttpStatus { status, url: url.clone() }
	} else {
		UpstreamError::ConnectionFailure { url: url.clone(), reason: err.to_string() }
	}
}
