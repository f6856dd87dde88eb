//! HTTP surface: router wiring and the serve loop.

// crates.io
use axum::{
	Router,
	extract::{Query, State, rejection::QueryRejection},
	response::{IntoResponse, Response},
	routing::get,
};
#[cfg(feature = "prometheus")] use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
// self
use crate::{
	_prelude::*,
	resolver::EndpointResolver,
	webfinger::{self, WebFingerParams},
};

/// Path of the WebFinger discovery endpoint.
pub const WEBFINGER_PATH: &str = "/.well-known/webfinger";
/// Path of the liveness probe.
pub const HEALTH_PATH: &str = "/health";

/// State shared by every handler.
#[derive(Clone, Debug)]
pub struct AppState {
	resolver: Arc<EndpointResolver>,
	#[cfg(feature = "prometheus")]
	prometheus: Option<PrometheusHandle>,
}
impl AppState {
	/// Wrap a resolver for sharing across handlers.
	pub fn new(resolver: EndpointResolver) -> Self {
		Self {
			resolver: Arc::new(resolver),
			#[cfg(feature = "prometheus")]
			prometheus: None,
		}
	}

	/// Serve `handle` on the metrics endpoint.
	#[cfg(feature = "prometheus")]
	pub fn with_prometheus(mut self, handle: PrometheusHandle) -> Self {
		self.prometheus = Some(handle);

		self
	}

	/// Resolver backing the handlers.
	pub fn resolver(&self) -> &EndpointResolver {
		&self.resolver
	}
}

/// Build the proxy router.
pub fn router(state: AppState) -> Router {
	let router = Router::new()
		.route(WEBFINGER_PATH, get(webfinger_handler))
		.route(HEALTH_PATH, get(health_handler));
	#[cfg(feature = "prometheus")]
	let router = router.route("/metrics", get(metrics_handler));

	router.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Serve `router` on `listener` until ctrl-c is received.
pub async fn serve(listener: TcpListener, router: Router) -> Result<()> {
	tracing::info!(addr = ?listener.local_addr().ok(), "listening");

	axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;

	tracing::info!("server stopped");

	Ok(())
}

async fn webfinger_handler(
	State(state): State<AppState>,
	query: std::result::Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Response {
	let params = match query {
		Ok(Query(pairs)) => WebFingerParams::from_pairs(pairs),
		Err(rejection) => return Error::Input(rejection.body_text()).into_response(),
	};

	webfinger::handle_webfinger(state.resolver(), params.resource.as_deref())
		.await
		.map(axum::Json)
		.into_response()
}

async fn health_handler(State(state): State<AppState>) -> Response {
	webfinger::handle_health(state.resolver()).await.into_response()
}

#[cfg(feature = "prometheus")]
async fn metrics_handler(State(state): State<AppState>) -> Response {
	match &state.prometheus {
		Some(handle) => handle.render().into_response(),
		None => http::StatusCode::NOT_FOUND.into_response(),
	}
}

async fn shutdown_signal() {
	if let Err(err) = tokio::signal::ctrl_c().await {
		tracing::error!(error = %err, "failed to listen for shutdown signal");

		std::future::pending::<()>().await;
	}
}
