//! HTTP front end for the admission-controlled transcription queue
//!
//! Three endpoints: submit (`POST /transcribe`, sync by default, async
//! via `?async=true`), poll (`GET /transcribe/status/:job_id`), and
//! health (`GET /health`). Backpressure shows up as `503` with a
//! structured backoff descriptor, never as unbounded queueing.

pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod state;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Route table; middleware layers are applied by the caller
pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/transcribe", post(handlers::submit))
		.route("/transcribe/status/:job_id", get(handlers::job_status))
		.route("/health", get(handlers::health))
		.with_state(state)
}
