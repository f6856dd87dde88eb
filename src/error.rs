//! Crate-wide error types and `Result` alias.

// crates.io
use http::StatusCode;
use url::Url;

/// Library-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the WebFinger proxy crate.
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error(transparent)]
	Url(#[from] url::ParseError),

	#[error(transparent)]
	Upstream(#[from] UpstreamError),

	#[error("Invalid resource: {0}")]
	Input(String),
	#[cfg(feature = "metrics")]
	#[error("Metrics error: {0}")]
	Metrics(String),
	#[error("Security violation: {0}")]
	Security(String),
	#[error("Validation failed for {field}: {reason}")]
	Validation { field: &'static str, reason: String },
}
impl Error {
	/// Classify the error into the proxy's failure taxonomy.
	pub fn class(&self) -> ErrorClass {
		match self {
			Self::Upstream(err) => err.class(),
			Self::Input(_) => ErrorClass::Input,
			Self::Security(_) | Self::Validation { .. } | Self::Url(_) => ErrorClass::Configuration,
			_ => ErrorClass::Internal,
		}
	}
}

/// Failures produced while fetching or validating the identity provider configuration.
///
/// The set is closed and cheap to clone so a single outcome can be handed to every caller
/// waiting on the same fetch.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamError {
	/// Every attempt exceeded the per-attempt timeout.
	#[error("Upstream request to {url} timed out.")]
	Timeout {
		/// Configuration endpoint that was queried.
		url: Url,
	},
	/// The connection could not be established or was dropped mid-exchange.
	#[error("Failed to reach upstream {url}: {reason}")]
	ConnectionFailure {
		/// Configuration endpoint that was queried.
		url: Url,
		/// Transport-level failure description.
		reason: String,
	},
	/// The upstream answered with a non-success status.
	#[error("Upstream HTTP status {status} from {url}.")]
	HttpStatus {
		/// Status code returned by the upstream.
		status: StatusCode,
		/// Configuration endpoint that was queried.
		url: Url,
	},
	/// The payload was not a JSON object.
	#[error("Malformed upstream payload: {0}")]
	MalformedPayload(String),
	/// A required endpoint key was absent or empty.
	#[error("Upstream payload is missing required field '{0}'.")]
	MissingField(&'static str),
}
impl UpstreamError {
	/// Classify the failure for status-code mapping.
	pub fn class(&self) -> ErrorClass {
		match self {
			Self::Timeout { .. } | Self::ConnectionFailure { .. } | Self::HttpStatus { .. } =>
				ErrorClass::UpstreamUnavailable,
			Self::MalformedPayload(_) | Self::MissingField(_) => ErrorClass::UpstreamInvalid,
		}
	}

	/// Whether another attempt may succeed where this one failed.
	pub fn is_transient(&self) -> bool {
		match self {
			Self::Timeout { .. } | Self::ConnectionFailure { .. } => true,
			Self::HttpStatus { status, .. } => matches!(
				*status,
				StatusCode::TOO_MANY_REQUESTS
					| StatusCode::INTERNAL_SERVER_ERROR
					| StatusCode::BAD_GATEWAY
					| StatusCode::SERVICE_UNAVAILABLE
					| StatusCode::GATEWAY_TIMEOUT
			),
			Self::MalformedPayload(_) | Self::MissingField(_) => false,
		}
	}
}

/// Failure taxonomy shared by every layer of the proxy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
	/// Caller supplied a missing or malformed resource.
	Input,
	/// The identity provider could not be reached or answered with an error status.
	UpstreamUnavailable,
	/// The identity provider answered with a malformed or incomplete document.
	UpstreamInvalid,
	/// Startup configuration was rejected.
	Configuration,
	/// Anything not covered by the other classes.
	Internal,
}
