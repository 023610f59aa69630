use serde::Serialize;

/// Clamp bounds for the retry-after estimate (seconds)
const RETRY_AFTER_MIN_SECS: u64 = 1;
const RETRY_AFTER_MAX_SECS: u64 = 60;

/// Audio length assumed per queued job when estimating wait time
///
/// The payload is opaque bytes at admission time, so its real duration is
/// unknown; a nominal short clip is assumed instead.
const NOMINAL_CLIP_SECS: f64 = 10.0;

/// Occupancy snapshot included with a rejection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
	pub active_workers: usize,
	pub queued_jobs: usize,
	pub queue_capacity: usize,
}

/// Retry guidance handed to rejected clients
///
/// Fixed exponential policy: clients should start at `initial_delay`
/// seconds and multiply until `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BackoffStrategy {
	#[serde(rename = "type")]
	pub kind: &'static str,
	pub initial_delay: f64,
	pub max_delay: f64,
	pub multiplier: f64,
}

impl Default for BackoffStrategy {
	fn default() -> Self {
		Self {
			kind: "exponential",
			initial_delay: 1.0,
			max_delay: 30.0,
			multiplier: 2.0,
		}
	}
}

/// Structured admission rejection: everything a client needs to
/// self-throttle without hammering the status endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejection {
	pub retry_after_seconds: u64,
	pub queue_status: QueueStatus,
	pub backoff_strategy: BackoffStrategy,
}

impl Rejection {
	pub fn new(status: QueueStatus, max_workers: usize, estimated_time_per_second_audio: f64) -> Self {
		Self {
			retry_after_seconds: estimate_retry_after(status.active_workers + status.queued_jobs, max_workers, estimated_time_per_second_audio),
			queue_status: status,
			backoff_strategy: BackoffStrategy::default(),
		}
	}
}

/// Estimate how long until a slot frees up
///
/// `jobs_ahead` work items drain through `max_workers` slots, each
/// costing roughly `NOMINAL_CLIP_SECS * estimate` seconds of processing.
/// Clamped so clients neither spin nor give up.
pub fn estimate_retry_after(jobs_ahead: usize, max_workers: usize, estimated_time_per_second_audio: f64) -> u64 {
	let slots = max_workers.max(1) as f64;
	let per_job_secs = (NOMINAL_CLIP_SECS * estimated_time_per_second_audio).max(0.0);
	let wait = (jobs_ahead as f64 / slots * per_job_secs).ceil() as u64;
	wait.clamp(RETRY_AFTER_MIN_SECS, RETRY_AFTER_MAX_SECS)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_retry_after_grows_with_depth() {
		let shallow = estimate_retry_after(1, 1, 0.5);
		let deep = estimate_retry_after(6, 1, 0.5);
		assert!(deep > shallow, "deeper queue must wait longer ({shallow} vs {deep})");
	}

	#[test]
	fn test_retry_after_clamped() {
		assert_eq!(estimate_retry_after(0, 1, 0.5), RETRY_AFTER_MIN_SECS);
		assert_eq!(estimate_retry_after(1000, 1, 0.5), RETRY_AFTER_MAX_SECS);
	}

	#[test]
	fn test_more_workers_shorter_wait() {
		let one = estimate_retry_after(6, 1, 0.5);
		let four = estimate_retry_after(6, 4, 0.5);
		assert!(four < one);
	}

	#[test]
	fn test_default_backoff_shape() {
		let backoff = BackoffStrategy::default();
		assert_eq!(backoff.kind, "exponential");
		assert!(backoff.initial_delay < backoff.max_delay);
		assert!(backoff.multiplier > 1.0);
	}
}
