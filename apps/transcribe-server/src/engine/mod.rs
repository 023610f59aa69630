#[cfg(feature = "whisper")]
mod whisper;

use anyhow::Result;
use std::sync::Arc;
use tracing::warn;
use transcribe_queue::{EngineError, TranscriptionEngine};

use crate::config::{Config, EngineKind};

/// Accepts everything, transcribes nothing
///
/// Exercises the full queue path without a model; smoke tests and
/// environments without the native whisper toolchain.
struct NoopEngine;

impl TranscriptionEngine for NoopEngine {
	fn transcribe(&self, _audio: &[u8]) -> Result<String, EngineError> {
		Ok(String::new())
	}
}

/// Build the configured transcription backend
pub fn build(config: &Config) -> Result<Arc<dyn TranscriptionEngine>> {
	match config.engine {
		EngineKind::Noop => {
			warn!("⚠️ Using the noop engine, transcripts will be empty");
			Ok(Arc::new(NoopEngine))
		}
		EngineKind::Whisper => {
			#[cfg(feature = "whisper")]
			{
				let model_path = config.whisper_model_path.as_deref().ok_or_else(|| anyhow::anyhow!("whisper_model_path is required for the whisper engine"))?;
				Ok(Arc::new(whisper::WhisperEngine::load(model_path, config.whisper_threads)?))
			}
			#[cfg(not(feature = "whisper"))]
			{
				anyhow::bail!("built without the whisper feature; rebuild with --features whisper or run with --engine noop")
			}
		}
	}
}
