//! WebFinger and health request handling.

// crates.io
use axum::{
	Json,
	response::{IntoResponse, Response},
};
use http::StatusCode;
use serde::{Deserialize, Serialize};
// self
use crate::{
	_prelude::*,
	ErrorClass,
	discovery::IdentityProviderConfig,
	resolver::EndpointResolver,
};

/// Link relation advertising the OpenID Connect issuer.
pub const ISSUER_REL: &str = "http://openid.net/specs/connect/1.0/issuer";
/// Scheme every requested resource must carry.
pub const ACCT_SCHEME: &str = "acct:";

const MISSING_RESOURCE: &str = "Missing resource parameter";
const INVALID_SCHEME: &str = "Resource must start with 'acct:'";
const UNAVAILABLE: &str = "Service temporarily unavailable";
const INTERNAL: &str = "Internal server error";

/// Query parameters accepted by the WebFinger endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WebFingerParams {
	/// Account identifier being looked up.
	pub resource: Option<String>,
}
impl WebFingerParams {
	/// Pick the parameters out of decoded query pairs.
	///
	/// A repeated `resource` keeps its first value; other keys (such as `rel`) are ignored.
	pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
		let resource =
			pairs.into_iter().find_map(|(key, value)| (key == "resource").then_some(value));

		Self { resource }
	}
}

/// A single `rel`/`href` pair in the link set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
	/// Link relation type.
	pub rel: String,
	/// Target URL.
	pub href: String,
}
impl Link {
	fn new(rel: &str, href: &str) -> Self {
		Self { rel: rel.to_owned(), href: href.to_owned() }
	}
}

/// JSON resource descriptor returned for a successful lookup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebFingerResponse {
	/// The resource exactly as requested.
	pub subject: String,
	/// Identity provider endpoints, issuer first.
	pub links: Vec<Link>,
}
impl WebFingerResponse {
	/// Shape `config` into a link set for `subject`.
	pub fn new(subject: impl Into<String>, config: &IdentityProviderConfig) -> Self {
		Self {
			subject: subject.into(),
			links: vec![
				Link::new(ISSUER_REL, &config.issuer),
				Link::new("authorization_endpoint", &config.authorization_endpoint),
				Link::new("token_endpoint", &config.token_endpoint),
				Link::new("userinfo_endpoint", &config.userinfo_endpoint),
				Link::new("jwks_uri", &config.jwks_uri),
			],
		}
	}
}

/// Error body shared by every failing response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
	/// Client-facing failure description.
	pub error: String,
}

/// Health probe result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum HealthReport {
	/// Upstream configuration was resolved.
	Healthy {
		/// Identity provider domain.
		domain: String,
		/// Application slug.
		application: String,
		/// Seconds since the cached configuration was fetched.
		cache_age: Option<u64>,
	},
	/// Upstream configuration could not be resolved.
	Unhealthy {
		/// Failure description.
		error: String,
	},
}
impl HealthReport {
	/// Status code matching the report.
	pub fn status_code(&self) -> StatusCode {
		match self {
			Self::Healthy { .. } => StatusCode::OK,
			Self::Unhealthy { .. } => StatusCode::SERVICE_UNAVAILABLE,
		}
	}
}
impl IntoResponse for HealthReport {
	fn into_response(self) -> Response {
		(self.status_code(), Json(self)).into_response()
	}
}

/// Check the `acct:` contract on the requested resource.
///
/// An empty parameter counts as absent. No further normalization is applied.
pub fn parse_resource(resource: Option<&str>) -> Result<&str> {
	match resource {
		None | Some("") => Err(Error::Input(MISSING_RESOURCE.into())),
		Some(value) if !value.starts_with(ACCT_SCHEME) => Err(Error::Input(INVALID_SCHEME.into())),
		Some(value) => Ok(value),
	}
}

/// Resolve the link set for `resource`.
#[tracing::instrument(skip(resolver, resource), fields(resource = resource.unwrap_or_default()))]
pub async fn handle_webfinger(
	resolver: &EndpointResolver,
	resource: Option<&str>,
) -> Result<WebFingerResponse> {
	let subject = parse_resource(resource).inspect_err(|err| {
		tracing::info!(error = %err, "rejected webfinger request");
	})?;
	let payload = resolver.resolve().await.inspect_err(|err| {
		tracing::warn!(error = %err, "failed to resolve identity provider configuration");
	})?;

	Ok(WebFingerResponse::new(subject, &payload.config))
}

/// Probe upstream reachability through the same cache path as lookups.
#[tracing::instrument(skip(resolver))]
pub async fn handle_health(resolver: &EndpointResolver) -> HealthReport {
	match resolver.resolve().await {
		Ok(payload) => {
			let settings = resolver.settings();

			HealthReport::Healthy {
				domain: settings.domain.clone(),
				application: settings.application.clone(),
				cache_age: Some(payload.age(Instant::now()).as_secs()),
			}
		},
		Err(err) => {
			tracing::warn!(error = %err, "health check failed");

			HealthReport::Unhealthy { error: err.to_string() }
		},
	}
}

/// Map an error onto the status code and body sent to the client.
pub fn error_response(err: &Error) -> (StatusCode, ErrorBody) {
	let (status, message) = match (err.class(), err) {
		(ErrorClass::Input, Error::Input(message)) => (StatusCode::BAD_REQUEST, message.as_str()),
		(ErrorClass::UpstreamUnavailable, _) => (StatusCode::SERVICE_UNAVAILABLE, UNAVAILABLE),
		_ => (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL),
	};

	(status, ErrorBody { error: message.to_owned() })
}

impl IntoResponse for Error {
	fn into_response(self) -> Response {
		let (status, body) = error_response(&self);

		(status, Json(body)).into_response()
	}
}
