use thiserror::Error;

/// Errors surfaced by a transcription engine call
///
/// Every engine failure is contained at the worker-slot boundary and
/// recorded on the job; it never takes a worker slot down with it.
#[derive(Debug, Error)]
pub enum EngineError {
	/// The model rejected or failed on this input
	#[error("transcription failed: {0}")]
	Transcription(String),

	/// The engine is not ready to accept work (model not loaded)
	#[error("engine not ready: {0}")]
	NotReady(String),
}

/// Black-box transcription collaborator
///
/// The queue does not know or care how transcription happens. The only
/// contract it relies on:
/// - `transcribe` is BLOCKING and CPU-bound; it may take seconds and it
///   may fail. Workers call it inside `spawn_blocking`.
/// - the engine tolerates up to `max_workers` simultaneous calls; the
///   pool never issues more than that.
/// - `is_loaded` is a cheap readiness flag for health reporting.
///
/// Processing duration is measured by the calling worker around this
/// call, not by the engine.
pub trait TranscriptionEngine: Send + Sync + 'static {
	fn transcribe(&self, audio: &[u8]) -> Result<String, EngineError>;

	fn is_loaded(&self) -> bool {
		true
	}
}
