//! WebFinger endpoint behaviour and upstream failure mapping.

// std
use std::{
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};
// crates.io
use axum::http::StatusCode;
use serde_json::json;
use wiremock::{
	Mock, MockServer, ResponseTemplate,
	matchers::{method, path},
};
// self
use crate::*;

const WEBFINGER: &str = "/.well-known/webfinger?resource=acct:user@example.com";

#[tokio::test]
async fn returns_link_set_for_acct_resource() {
	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path(APP_PATH))
		.respond_with(
			ResponseTemplate::new(200)
				.set_body_string(IDP_BODY)
				.insert_header("content-type", "application/json"),
		)
		.expect(1)
		.mount(&server)
		.await;

	let (app, _) = build(mock_settings(&server));
	let (status, body) = get_json(&app, WEBFINGER).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["subject"], "acct:user@example.com");
	assert_eq!(body["links"].as_array().map(Vec::len), Some(5));
	assert_eq!(body["links"][0]["rel"], "http://openid.net/specs/connect/1.0/issuer");
	assert_eq!(body["links"][0]["href"], "https://test.example.com/application/o/testapp/");

	server.verify().await;
}

#[tokio::test]
async fn shapes_upstream_values_exactly() {
	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path(APP_PATH))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"issuer": "https://idp/x/",
			"authorization_endpoint": "https://idp/x/az",
			"token_endpoint": "https://idp/x/tok",
			"userinfo_endpoint": "https://idp/x/ui",
			"jwks_uri": "https://idp/x/jwks"
		})))
		.mount(&server)
		.await;

	let (app, _) = build(mock_settings(&server));
	let (status, body) =
		get_json(&app, "/.well-known/webfinger?resource=acct:alice@example.com").await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(
		body,
		json!({
			"subject": "acct:alice@example.com",
			"links": [
				{"rel": "http://openid.net/specs/connect/1.0/issuer", "href": "https://idp/x/"},
				{"rel": "authorization_endpoint", "href": "https://idp/x/az"},
				{"rel": "token_endpoint", "href": "https://idp/x/tok"},
				{"rel": "userinfo_endpoint", "href": "https://idp/x/ui"},
				{"rel": "jwks_uri", "href": "https://idp/x/jwks"}
			]
		})
	);
}

#[tokio::test]
async fn rejects_missing_and_foreign_resources_without_upstream_calls() {
	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path(APP_PATH))
		.respond_with(ResponseTemplate::new(200).set_body_string(IDP_BODY))
		.expect(0)
		.mount(&server)
		.await;

	let (app, _) = build(mock_settings(&server));

	let (status, body) = get_json(&app, "/.well-known/webfinger").await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(body, json!({"error": "Missing resource parameter"}));

	for resource in ["mailto:x@example.com", "invalid:user@example.com"] {
		let (status, body) =
			get_json(&app, &format!("/.well-known/webfinger?resource={resource}")).await;

		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body, json!({"error": "Resource must start with 'acct:'"}));
	}

	server.verify().await;
}

#[tokio::test]
async fn incomplete_upstream_document_yields_internal_error() {
	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path(APP_PATH))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"issuer": "https://test.example.com/application/o/testapp/",
			"authorization_endpoint": "https://test.example.com/application/o/testapp/authorize/",
			"token_endpoint": "https://test.example.com/application/o/testapp/token/",
			"userinfo_endpoint": "https://test.example.com/application/o/testapp/userinfo/"
		})))
		.expect(1)
		.mount(&server)
		.await;

	let (app, _) = build(mock_settings(&server));
	let (status, body) = get_json(&app, WEBFINGER).await;

	assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
	assert_eq!(body, json!({"error": "Internal server error"}));

	server.verify().await;
}

#[tokio::test]
async fn non_json_upstream_document_yields_internal_error() {
	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path(APP_PATH))
		.respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
		.expect(1)
		.mount(&server)
		.await;

	let (app, _) = build(mock_settings(&server));
	let (status, body) = get_json(&app, WEBFINGER).await;

	assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
	assert_eq!(body["error"], "Internal server error");

	server.verify().await;
}

#[tokio::test]
async fn upstream_timeouts_are_retried_then_reported_unavailable() {
	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path(APP_PATH))
		.respond_with(
			ResponseTemplate::new(200).set_body_string(IDP_BODY).set_delay(Duration::from_secs(2)),
		)
		.expect(3)
		.mount(&server)
		.await;

	let (app, _) = build(mock_settings(&server));
	let (status, body) = get_json(&app, WEBFINGER).await;

	assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
	assert_eq!(body, json!({"error": "Service temporarily unavailable"}));

	server.verify().await;
}

#[tokio::test]
async fn transient_statuses_exhaust_three_attempts() {
	for code in [429, 500, 502, 503, 504] {
		let server = MockServer::start().await;

		Mock::given(method("GET"))
			.and(path(APP_PATH))
			.respond_with(ResponseTemplate::new(code))
			.expect(3)
			.mount(&server)
			.await;

		let (app, _) = build(mock_settings(&server));
		let (status, body) = get_json(&app, WEBFINGER).await;

		assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE, "upstream {code}");
		assert_eq!(body["error"], "Service temporarily unavailable");

		server.verify().await;
	}
}

#[tokio::test]
async fn non_transient_status_is_not_retried() {
	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path(APP_PATH))
		.respond_with(ResponseTemplate::new(404))
		.expect(1)
		.mount(&server)
		.await;

	let (app, _) = build(mock_settings(&server));
	let (status, _) = get_json(&app, WEBFINGER).await;

	assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

	server.verify().await;
}

#[tokio::test]
async fn recovers_when_a_retry_succeeds() {
	let server = MockServer::start().await;
	let calls = Arc::new(AtomicUsize::new(0));
	let counter = calls.clone();

	Mock::given(method("GET"))
		.and(path(APP_PATH))
		.respond_with(move |_: &wiremock::Request| {
			if counter.fetch_add(1, Ordering::SeqCst) == 0 {
				ResponseTemplate::new(503)
			} else {
				ResponseTemplate::new(200).set_body_string(IDP_BODY)
			}
		})
		.mount(&server)
		.await;

	let (app, _) = build(mock_settings(&server));
	let (status, body) = get_json(&app, WEBFINGER).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["subject"], "acct:user@example.com");
	assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn connection_failure_yields_service_unavailable() {
	let (app, resolver) = build(settings_for(unreachable_upstream()));
	let (status, body) = get_json(&app, WEBFINGER).await;

	assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
	assert_eq!(body, json!({"error": "Service temporarily unavailable"}));
	assert_eq!(resolver.cache().metrics().snapshot().fetch_failures, 1);
}

#[tokio::test]
async fn repeated_resource_uses_first_value() {
	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path(APP_PATH))
		.respond_with(ResponseTemplate::new(200).set_body_string(IDP_BODY))
		.expect(1)
		.mount(&server)
		.await;

	let (app, _) = build(mock_settings(&server));
	let (status, body) = get_json(
		&app,
		"/.well-known/webfinger?resource=acct:a@example.com&resource=acct:b@example.com",
	)
	.await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["subject"], "acct:a@example.com");

	server.verify().await;
}

#[tokio::test]
async fn repeated_foreign_resource_is_rejected_as_json() {
	let server = MockServer::start().await;
	let (app, _) = build(mock_settings(&server));
	let (status, body) = get_json(
		&app,
		"/.well-known/webfinger?resource=mailto:a@example.com&resource=acct:b@example.com",
	)
	.await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(body, json!({"error": "Resource must start with 'acct:'"}));
}

#[tokio::test]
async fn oversized_upstream_body_is_rejected() {
	let server = MockServer::start().await;
	let padding = " ".repeat(webfinger_proxy::http::client::MAX_RESPONSE_BYTES);

	Mock::given(method("GET"))
		.and(path(APP_PATH))
		.respond_with(ResponseTemplate::new(200).set_body_string(format!("{IDP_BODY}{padding}")))
		.expect(1)
		.mount(&server)
		.await;

	let (app, resolver) = build(mock_settings(&server));
	let (status, body) = get_json(&app, WEBFINGER).await;

	assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
	assert_eq!(body, json!({"error": "Internal server error"}));
	assert!(resolver.cache().snapshot().await.is_none());

	server.verify().await;
}
