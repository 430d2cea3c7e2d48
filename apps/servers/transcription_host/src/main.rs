use anyhow::Result;
use axum::error_handling::HandleErrorLayer;
use clap::Parser;
use std::{net::SocketAddr, sync::Arc};
use tokio::{net::TcpListener, time::Duration};
use tokio_util::sync::CancellationToken;
use tower::{limit::ConcurrencyLimitLayer, load_shed::LoadShedLayer, timeout::TimeoutLayer, BoxError, ServiceBuilder};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{filter::EnvFilter, fmt::format::JsonFields, util::SubscriberInitExt, Layer};
use transcription_host::{app_router, AppError, AppState, Config};

async fn handle_tower_error(error: BoxError) -> AppError {
	if error.is::<tower::timeout::error::Elapsed>() {
		tracing::warn!("Request timeout: {}", error);
		AppError::RequestTimeout
	} else if error.is::<tower::load_shed::error::Overloaded>() {
		tracing::warn!("Service overloaded: {}", error);
		AppError::ServiceOverloaded
	} else {
		tracing::error!("Unhandled tower error: {}", error);
		AppError::TowerError(error)
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	dotenv::dotenv().ok();
	let config = Config::parse();
	config.validate().map_err(anyhow::Error::msg)?;

	init_tracing(&config)?;

	let config = Arc::new(config);
	let shutdown_token = CancellationToken::new();
	let app_state = AppState::build(config.clone(), shutdown_token.clone()).await?;
	tracing::info!(model = %app_state.engine.model_name(), data_dir = %config.data_dir.display(), "Transcription engine ready");

	let app = app_router(app_state.clone()).layer(
		ServiceBuilder::new()
			.layer(TraceLayer::new_for_http())
			.layer(HandleErrorLayer::new(|error: BoxError| async move { handle_tower_error(error).await }))
			.layer(RequestBodyLimitLayer::new(config.max_upload_mb * 1024 * 1024))
			.layer(ConcurrencyLimitLayer::new(config.max_concurrent_requests))
			.layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
			.layer(LoadShedLayer::new()),
	);

	let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
	let listener = TcpListener::bind(addr).await?;
	tracing::info!("listening on {}", listener.local_addr()?);

	// Spawn signal handler task with proper shutdown coordination
	let signal_shutdown_token = shutdown_token.clone();
	tokio::spawn(async move {
		tokio::signal::ctrl_c().await.ok();
		tracing::info!("Received Ctrl+C, initiating shutdown...");
		signal_shutdown_token.cancel();
	});

	// Run server with graceful shutdown
	let server_token = shutdown_token.clone();
	axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
		.with_graceful_shutdown(async move {
			server_token.cancelled().await;
		})
		.await?;

	let stats = app_state.engine.sessions().stats();
	tracing::info!(jobs = app_state.engine.registry().len(), live_sessions = stats.live, "Shutdown complete");
	Ok(())
}

pub fn init_tracing(config: &Config) -> Result<()> {
	use tracing_subscriber::layer::SubscriberExt;

	let filter = EnvFilter::try_new(&config.rust_log)?;

	tracing_subscriber::registry()
		.with(if config.log_json {
			Box::new(
				tracing_subscriber::fmt::layer()
					.fmt_fields(JsonFields::default())
					.event_format(tracing_subscriber::fmt::format().json().flatten_event(true).with_span_list(false))
					.with_filter(filter),
			) as Box<dyn Layer<_> + Send + Sync>
		} else {
			Box::new(
				tracing_subscriber::fmt::layer()
					.event_format(tracing_subscriber::fmt::format().pretty())
					.with_filter(filter),
			)
		})
		.init();
	Ok(())
}
