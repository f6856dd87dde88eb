//! Integration tests driving the proxy router against a mock identity provider.

mod webfinger_endpoint;

// std
use std::time::Duration;
// crates.io
use axum::{
	Router,
	body::{self, Body},
	http::{Request, StatusCode},
};
use serde_json::Value;
use tower::ServiceExt;
use url::Url;
use webfinger_proxy::{AppState, EndpointResolver, ProxySettings, RetryPolicy, router};
use wiremock::MockServer;

pub const APP_PATH: &str = "/application/o/testapp/";

pub const IDP_BODY: &str = r#"{
	"issuer": "https://test.example.com/application/o/testapp/",
	"authorization_endpoint": "https://test.example.com/application/o/testapp/authorize/",
	"token_endpoint": "https://test.example.com/application/o/testapp/token/",
	"userinfo_endpoint": "https://test.example.com/application/o/testapp/userinfo/",
	"jwks_uri": "https://test.example.com/application/o/testapp/jwks/"
}"#;

pub fn fast_retry() -> RetryPolicy {
	RetryPolicy {
		attempt_timeout: Duration::from_millis(200),
		initial_backoff: Duration::from_millis(10),
		max_backoff: Duration::from_millis(50),
		..RetryPolicy::default()
	}
}

pub fn settings_for(upstream: Url) -> ProxySettings {
	ProxySettings::new("test.example.com", "testapp")
		.expect("settings")
		.with_upstream_url(upstream)
		.with_require_https(false)
		.with_retry_policy(fast_retry())
}

pub fn mock_settings(server: &MockServer) -> ProxySettings {
	settings_for(Url::parse(&format!("{}{APP_PATH}", server.uri())).expect("upstream url"))
}

pub fn build(settings: ProxySettings) -> (Router, EndpointResolver) {
	let _ = tracing_subscriber::fmt::try_init();

	let resolver = EndpointResolver::new(settings).expect("resolver");

	(router(AppState::new(resolver.clone())), resolver)
}

/// Upstream URL on a port nothing listens on.
pub fn unreachable_upstream() -> Url {
	let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
	let addr = listener.local_addr().expect("addr");

	drop(listener);

	Url::parse(&format!("http://{addr}{APP_PATH}")).expect("url")
}

pub async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
	let response = app
		.clone()
		.oneshot(Request::builder().uri(uri).body(Body::empty()).expect("request"))
		.await
		.expect("response");
	let status = response.status();
	let bytes = body::to_bytes(response.into_body(), usize::MAX).await.expect("body");
	let json = serde_json::from_slice(&bytes).expect("json body");

	(status, json)
}
