use anyhow::Result;
use std::time::Instant;
use tracing::{info, warn};
use transcribe_queue::{EngineError, TranscriptionEngine};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

/// whisper.cpp backed engine
///
/// Holds one loaded context; per-call state is created inside
/// `transcribe`, so the queue may run up to its pool size of calls
/// concurrently against the shared context.
pub struct WhisperEngine {
	ctx: WhisperContext,
	threads: i32,
}

impl WhisperEngine {
	pub fn load(model_path: &str, threads: i32) -> Result<Self> {
		info!("🔄 Loading Whisper model from {}...", model_path);
		let start = Instant::now();

		let ctx = WhisperContext::new_with_params(model_path, WhisperContextParameters::default())?;

		let load_time = start.elapsed();
		info!(load_time_ms = load_time.as_millis(), threads, "✅ Whisper model loaded");

		Ok(Self { ctx, threads })
	}

	fn params(&self) -> FullParams<'static, 'static> {
		let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
		params.set_translate(false);
		params.set_print_special(false);
		params.set_print_progress(false);
		params.set_print_realtime(false);
		params.set_print_timestamps(false);
		params.set_n_threads(self.threads);
		params
	}
}

impl TranscriptionEngine for WhisperEngine {
	fn transcribe(&self, audio: &[u8]) -> Result<String, EngineError> {
		let samples = pcm16_to_f32(audio);
		if samples.is_empty() {
			return Err(EngineError::Transcription("payload contains no audio samples".into()));
		}

		let mut state = self.ctx.create_state().map_err(|e| EngineError::Transcription(format!("failed to create whisper state: {e}")))?;

		state
			.full(self.params(), &samples)
			.map_err(|e| EngineError::Transcription(format!("whisper inference failed: {e}")))?;

		let num_segments = state.full_n_segments();
		if num_segments == 0 {
			warn!("⚠️ No segments extracted, audio may be silence");
			return Ok(String::new());
		}

		let mut text = String::new();
		for i in 0..num_segments {
			if let Some(segment) = state.get_segment(i) {
				if let Ok(piece) = segment.to_str() {
					let trimmed = piece.trim();
					if !trimmed.is_empty() {
						if !text.is_empty() {
							text.push(' ');
						}
						text.push_str(trimmed);
					}
				}
			}
		}

		Ok(text)
	}

	fn is_loaded(&self) -> bool {
		true
	}
}

/// Interpret the payload as 16 kHz mono 16-bit PCM
///
/// A RIFF/WAVE header, when present, is skipped; everything else is read
/// as raw little-endian samples. Resampling and format negotiation are
/// the uploader's problem.
fn pcm16_to_f32(audio: &[u8]) -> Vec<f32> {
	let data = if audio.len() > 44 && audio.starts_with(b"RIFF") { &audio[44..] } else { audio };

	data
		.chunks_exact(2)
		.map(|pair| f32::from(i16::from_le_bytes([pair[0], pair[1]])) / f32::from(i16::MAX))
		.collect()
}
