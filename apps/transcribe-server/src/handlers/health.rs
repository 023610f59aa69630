use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::instrument;

use crate::state::AppState;

#[derive(Serialize)]
struct QueueSection {
	max_workers: usize,
	active_workers: usize,
	queued_jobs: usize,
	processing_jobs: usize,
	queue_size: usize,
	queue_capacity: usize,
}

#[derive(Serialize)]
struct ConcurrencySection {
	max_concurrent_transcriptions: usize,
	max_queue_size: usize,
}

#[derive(Serialize)]
pub struct HealthResponse {
	status: &'static str,
	model_loaded: bool,
	queue: QueueSection,
	concurrency: ConcurrencySection,
}

/// Live occupancy snapshot
///
/// Stays responsive while every worker slot is saturated; it only takes
/// the snapshot lock, never the job execution path.
#[axum::debug_handler]
#[instrument(name = "health", skip_all)]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
	let snapshot = state.queue.health();

	let response = HealthResponse {
		status: "ok",
		model_loaded: snapshot.model_loaded,
		queue: QueueSection {
			max_workers: snapshot.max_workers,
			active_workers: snapshot.active_workers,
			queued_jobs: snapshot.queued_jobs,
			processing_jobs: snapshot.active_workers,
			queue_size: snapshot.queued_jobs,
			queue_capacity: snapshot.queue_capacity,
		},
		concurrency: ConcurrencySection {
			max_concurrent_transcriptions: snapshot.max_workers,
			max_queue_size: snapshot.queue_capacity,
		},
	};

	(StatusCode::OK, Json(response))
}
