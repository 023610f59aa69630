use std::sync::Arc;
use transcribe_queue::TranscriptionQueue;

/// Shared handle passed to every request handler
///
/// Built once at startup; no module-level singletons.
#[derive(Clone)]
pub struct AppState {
	pub queue: Arc<TranscriptionQueue>,
}

impl AppState {
	pub const fn new(queue: Arc<TranscriptionQueue>) -> Self {
		Self { queue }
	}
}
