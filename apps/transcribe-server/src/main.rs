use anyhow::Result;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;
use transcribe_queue::TranscriptionQueue;

use transcribe_server::config::Config;
use transcribe_server::state::AppState;
use transcribe_server::{engine, router};

#[tokio::main]
async fn main() -> Result<()> {
	// Load environment variables
	dotenvy::dotenv().ok();

	let config = Config::parse();
	config.validate().map_err(|e| anyhow::anyhow!(e))?;

	init_tracing();

	info!(
		host = %config.host,
		port = config.port,
		max_concurrent_transcriptions = config.max_concurrent_transcriptions,
		max_queue_size = config.max_queue_size,
		"🎯 Starting transcribe-server"
	);

	let engine = engine::build(&config)?;
	let queue = TranscriptionQueue::start(config.queue_config(), engine);
	let state = AppState::new(queue.clone());

	let app = router(state)
		.layer(TraceLayer::new_for_http())
		.layer(RequestBodyLimitLayer::new(config.max_upload_bytes()));

	let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
	info!("🎧 Listening on {}", listener.local_addr()?);

	axum::serve(listener, app).with_graceful_shutdown(wait_for_shutdown_signal()).await?;

	info!("🛑 Shutdown signal received");
	queue.shutdown();

	let counters = queue.counters.snapshot();
	info!(
		jobs_accepted = counters.jobs_accepted,
		jobs_rejected = counters.jobs_rejected,
		jobs_completed = counters.jobs_completed,
		jobs_failed = counters.jobs_failed,
		"✅ Shutdown complete"
	);

	Ok(())
}

fn init_tracing() {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.init();
}

async fn wait_for_shutdown_signal() {
	let ctrl_c = async {
		signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
	};

	#[cfg(unix)]
	let terminate = async {
		signal::unix::signal(signal::unix::SignalKind::terminate())
			.expect("failed to install SIGTERM handler")
			.recv()
			.await;
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		() = ctrl_c => {},
		() = terminate => {},
	}
}
