use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info};

use crate::job::{JobFailure, Transcript};
use crate::queue::TranscriptionQueue;

/// Spawn the fixed worker pool
///
/// Exactly `max_workers` long-lived tasks. Each one is a CPU drainpipe:
/// it pulls the next job, runs the engine call on the blocking thread
/// pool, records the outcome, and immediately looks for more work. Slots
/// never die on job failure; they exit only when the queue shuts down.
pub(crate) fn spawn_workers(queue: &Arc<TranscriptionQueue>) {
	for worker_id in 0..queue.config.max_workers {
		let queue = Arc::clone(queue);
		tokio::spawn(worker_loop(queue, worker_id));
	}
}

async fn worker_loop(queue: Arc<TranscriptionQueue>, worker_id: usize) {
	info!(worker_id, "🏭 Worker slot started");

	loop {
		if queue.shutdown_token.is_cancelled() {
			break;
		}

		match queue.take_next() {
			Some((job_id, payload)) => run_job(&queue, worker_id, &job_id, payload).await,
			None => {
				// Park until admission wakes us; notify_one stores a
				// permit, so a wakeup racing this await is not lost
				tokio::select! {
					() = queue.shutdown_token.cancelled() => break,
					() = queue.job_ready.notified() => {}
				}
			}
		}
	}

	info!(worker_id, "✅ Worker slot exiting");
}

/// Execute one job at the slot boundary
///
/// Engine errors and panics both land here and become a classified
/// `engine_error` on the job record; nothing propagates past the slot.
async fn run_job(queue: &Arc<TranscriptionQueue>, worker_id: usize, job_id: &str, payload: Vec<u8>) {
	debug!(worker_id, job_id = %job_id, payload_bytes = payload.len(), "🎬 Starting engine call");

	let engine = Arc::clone(&queue.engine);
	let started = Instant::now();
	let joined = tokio::task::spawn_blocking(move || engine.transcribe(&payload)).await;
	let duration_s = started.elapsed().as_secs_f64();

	let outcome = match joined {
		Ok(Ok(text)) => Ok(Transcript { text, duration_s }),
		Ok(Err(e)) => Err(JobFailure::engine(e.to_string())),
		Err(join_err) => {
			// A panicking engine must not take the slot down with it
			error!(worker_id, job_id = %job_id, error = %join_err, "Engine call aborted");
			if join_err.is_panic() {
				Err(JobFailure::engine("transcription engine panicked"))
			} else {
				Err(JobFailure::engine("transcription task cancelled"))
			}
		}
	};

	queue.finish(job_id, outcome);
}
