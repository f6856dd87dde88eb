//! Identity provider configuration document and its validation.

// crates.io
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
// self
use crate::UpstreamError;

/// Keys every configuration document must carry.
pub const REQUIRED_FIELDS: [&str; 5] =
	["issuer", "authorization_endpoint", "token_endpoint", "userinfo_endpoint", "jwks_uri"];

/// Endpoint URLs published by the identity provider for one application.
///
/// Instances only exist once every field is present and non-empty.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityProviderConfig {
	/// Issuer identifier.
	pub issuer: String,
	/// OAuth 2.0 authorization endpoint.
	pub authorization_endpoint: String,
	/// OAuth 2.0 token endpoint.
	pub token_endpoint: String,
	/// OpenID Connect userinfo endpoint.
	pub userinfo_endpoint: String,
	/// JSON Web Key Set document location.
	pub jwks_uri: String,
}

/// Parse and validate a raw configuration payload.
///
/// Presence is all that is checked; the values are treated as opaque strings.
pub fn validate(raw: &[u8]) -> Result<IdentityProviderConfig, UpstreamError> {
	let value: Value = serde_json::from_slice(raw)
		.map_err(|err| UpstreamError::MalformedPayload(err.to_string()))?;
	let Value::Object(object) = value else {
		return Err(UpstreamError::MalformedPayload("Expected a JSON object.".into()));
	};

	Ok(IdentityProviderConfig {
		issuer: required(&object, "issuer")?,
		authorization_endpoint: required(&object, "authorization_endpoint")?,
		token_endpoint: required(&object, "token_endpoint")?,
		userinfo_endpoint: required(&object, "userinfo_endpoint")?,
		jwks_uri: required(&object, "jwks_uri")?,
	})
}

fn required(object: &Map<String, Value>, field: &'static str) -> Result<String, UpstreamError> {
	match object.get(field) {
		None | Some(Value::Null) => Err(UpstreamError::MissingField(field)),
		Some(Value::String(value)) if value.trim().is_empty() =>
			Err(UpstreamError::MissingField(field)),
		Some(Value::String(value)) => Ok(value.clone()),
		Some(other) => Err(UpstreamError::MalformedPayload(format!(
			"Field '{field}' must be a string, found {other}."
		))),
	}
}
