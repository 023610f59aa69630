use clap::{Parser, ValueEnum};
use std::time::Duration;
use transcribe_queue::QueueConfig;

/// Transcription backend selection
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
	/// whisper.cpp via whisper-rs (requires the `whisper` feature)
	Whisper,
	/// Accepts everything, transcribes nothing; smoke tests only
	Noop,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "transcribe-server")]
#[command(about = "Admission-controlled HTTP transcription service", long_about = None)]
pub struct Config {
	/// Bind address
	#[arg(long, env = "HOST", default_value = "127.0.0.1")]
	pub host: String,

	/// Bind port
	#[arg(long, env = "PORT", default_value = "8080")]
	pub port: u16,

	/// Worker slots, i.e. simultaneous engine calls
	#[arg(long, env = "MAX_CONCURRENT_TRANSCRIPTIONS", default_value = "1")]
	pub max_concurrent_transcriptions: usize,

	/// Jobs held waiting for a free worker before rejecting
	#[arg(long, env = "MAX_QUEUE_SIZE", default_value = "5")]
	pub max_queue_size: usize,

	/// Processing seconds per second of audio; only feeds retry-after
	/// estimates on rejection
	#[arg(long, env = "ESTIMATED_TIME_PER_SECOND_AUDIO", default_value = "0.5")]
	pub estimated_time_per_second_audio: f64,

	/// How long finished jobs stay pollable
	#[arg(long, env = "JOB_RETENTION_SECONDS", default_value = "600")]
	pub job_retention_secs: u64,

	/// Hard cap on retained finished jobs
	#[arg(long, env = "MAX_FINISHED_JOBS", default_value = "256")]
	pub max_finished_jobs: usize,

	/// Request body limit in MiB
	#[arg(long, env = "MAX_UPLOAD_MB", default_value = "32")]
	pub max_upload_mb: usize,

	/// Transcription backend
	#[arg(long, env = "ENGINE", value_enum, default_value = "whisper")]
	pub engine: EngineKind,

	/// Whisper model path (whisper engine only)
	#[arg(long, env = "WHISPER_MODELS_PATH")]
	pub whisper_model_path: Option<String>,

	/// Threads per Whisper call (whisper engine only)
	#[arg(long, env = "WHISPER_THREADS", default_value = "2")]
	pub whisper_threads: i32,
}

impl Config {
	/// Validate configuration values
	pub fn validate(&self) -> Result<(), String> {
		if self.max_concurrent_transcriptions < 1 {
			return Err("max_concurrent_transcriptions must be at least 1".to_string());
		}

		if !self.estimated_time_per_second_audio.is_finite() || self.estimated_time_per_second_audio <= 0.0 {
			return Err("estimated_time_per_second_audio must be a positive number".to_string());
		}

		if self.max_upload_mb == 0 {
			return Err("max_upload_mb must be greater than 0".to_string());
		}

		if self.whisper_threads < 1 {
			return Err("whisper_threads must be at least 1".to_string());
		}

		if self.engine == EngineKind::Whisper && cfg!(feature = "whisper") && self.whisper_model_path.is_none() {
			return Err("whisper_model_path is required for the whisper engine".to_string());
		}

		Ok(())
	}

	pub fn queue_config(&self) -> QueueConfig {
		QueueConfig {
			max_workers: self.max_concurrent_transcriptions,
			max_queue_size: self.max_queue_size,
			estimated_time_per_second_audio: self.estimated_time_per_second_audio,
			job_retention: Duration::from_secs(self.job_retention_secs),
			max_finished_jobs: self.max_finished_jobs,
		}
	}

	pub const fn max_upload_bytes(&self) -> usize {
		self.max_upload_mb * 1024 * 1024
	}
}
