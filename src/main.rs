//! WebFinger proxy binary.

// std
use std::{net::SocketAddr, time::Duration};
// crates.io
use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use url::Url;
// self
use webfinger_proxy::{AppState, EndpointResolver, ProxySettings, Result, config};

/// Command line arguments
#[derive(Debug, Parser)]
#[command(name = "webfinger-proxy", version)]
#[command(about = "WebFinger discovery proxy for an OpenID Connect provider")]
struct Cli {
	/// Identity provider domain
	#[arg(long, env = "DOMAIN", default_value = config::DEFAULT_DOMAIN)]
	domain: String,

	/// Application slug on the identity provider
	#[arg(long, env = "APPLICATION", default_value = config::DEFAULT_APPLICATION)]
	application: String,

	/// Cache time-to-live in seconds
	#[arg(long, env = "CACHE_TTL", default_value_t = 300)]
	cache_ttl: u64,

	/// Per-attempt upstream timeout in seconds
	#[arg(long, env = "REQUEST_TIMEOUT", default_value_t = 10)]
	request_timeout: u64,

	/// Address to listen on
	#[arg(long, env = "BIND_ADDRESS", default_value = "0.0.0.0:8000")]
	bind: SocketAddr,

	/// Override the derived identity provider configuration URL
	#[arg(long, env = "UPSTREAM_URL")]
	upstream_url: Option<Url>,

	/// Allow a plain HTTP upstream URL
	#[arg(long, env = "ALLOW_HTTP_UPSTREAM")]
	allow_http: bool,
}
impl Cli {
	fn settings(&self) -> Result<ProxySettings> {
		let mut settings = ProxySettings::new(&self.domain, self.application.clone())?
			.with_cache_ttl(Duration::from_secs(self.cache_ttl))
			.with_request_timeout(Duration::from_secs(self.request_timeout))
			.with_require_https(!self.allow_http);

		if let Some(url) = &self.upstream_url {
			settings = settings.with_upstream_url(url.clone());
		}

		Ok(settings)
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.init();

	let cli = Cli::parse();
	let settings = cli.settings().inspect_err(|err| {
		tracing::error!(error = %err, "invalid configuration");
	})?;

	tracing::info!(
		domain = %settings.domain,
		application = %settings.application,
		upstream = %settings.upstream_url,
		cache_ttl = ?settings.cache_ttl,
		"starting webfinger proxy"
	);

	let state = AppState::new(EndpointResolver::new(settings)?);
	#[cfg(feature = "prometheus")]
	let state = state.with_prometheus(webfinger_proxy::install_exporter()?);
	let listener = TcpListener::bind(cli.bind).await?;

	webfinger_proxy::serve(listener, webfinger_proxy::router(state)).await
}
