//! Guards applied to the upstream identity provider target.

// crates.io
use url::Url;
// self
use crate::_prelude::*;

/// Canonicalise a DNS name by trimming whitespace, removing any trailing dot, and lowercasing.
pub fn canonicalize_dns_name(value: &str) -> Option<String> {
	let trimmed = value.trim();
	if trimmed.is_empty() {
		return None;
	}

	let without_trailing_dot = trimmed.trim_end_matches('.');
	if without_trailing_dot.is_empty() {
		return None;
	}

	Some(without_trailing_dot.to_ascii_lowercase())
}

/// Ensure the provided URL uses HTTPS.
pub fn enforce_https(url: &Url) -> Result<()> {
	if url.scheme() == "https" {
		Ok(())
	} else {
		Err(Error::Security(format!("Upstream URL {url} must use HTTPS.")))
	}
}

/// Ensure a domain can be embedded into a URL authority without changing its meaning.
pub fn validate_domain(domain: &str) -> Result<()> {
	if domain.chars().any(|c| matches!(c, '/' | '?' | '#' | '@' | '\\') || c.is_whitespace()) {
		return Err(Error::Validation {
			field: "domain",
			reason: format!("Domain '{domain}' contains characters not allowed in a host."),
		});
	}

	Ok(())
}
