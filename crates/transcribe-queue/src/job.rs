use serde::Serialize;
use std::time::{Duration, Instant};

/// Lifecycle of one transcription job
///
/// `Queued → Running → {Completed | Failed}`. Terminal states are final;
/// a job never re-enters `Queued` or `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
	Queued,
	Running,
	Completed,
	Failed,
}

impl JobState {
	pub const fn is_terminal(self) -> bool {
		matches!(self, Self::Completed | Self::Failed)
	}
}

/// Successful transcription output
///
/// `duration_s` is the wall time of the engine call as measured by the
/// worker slot that executed it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transcript {
	pub text: String,
	pub duration_s: f64,
}

/// Classified failure attached to a `Failed` job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobFailure {
	/// Stable machine-readable classification (`engine_error`)
	pub code: &'static str,
	pub message: String,
}

impl JobFailure {
	pub fn engine(message: impl Into<String>) -> Self {
		Self {
			code: "engine_error",
			message: message.into(),
		}
	}
}

/// Read-only projection of a job for status polling
///
/// A point-in-time snapshot: result or error are present only once the
/// job is terminal, and repeated polls of a terminal job return the same
/// view until the entry is evicted.
#[derive(Debug, Clone, PartialEq)]
pub enum JobStatusView {
	Queued,
	Running,
	Completed(Transcript),
	Failed(JobFailure),
}

impl JobStatusView {
	pub const fn state(&self) -> JobState {
		match self {
			Self::Queued => JobState::Queued,
			Self::Running => JobState::Running,
			Self::Completed(_) => JobState::Completed,
			Self::Failed(_) => JobState::Failed,
		}
	}
}

/// One submitted transcription request, from admission to eviction
///
/// Created by the admission controller, mutated only by the single
/// worker slot that popped it (pop-once semantics), read concurrently by
/// status pollers through [`JobStatusView`] snapshots.
#[derive(Debug)]
pub(crate) struct JobRecord {
	pub state: JobState,
	/// Owned exclusively by the job until the executing worker takes it;
	/// `None` once dispatched
	pub payload: Option<Vec<u8>>,
	pub submitted_at: Instant,
	pub started_at: Option<Instant>,
	pub finished_at: Option<Instant>,
	pub outcome: Option<Result<Transcript, JobFailure>>,
}

impl JobRecord {
	pub fn new(payload: Vec<u8>) -> Self {
		Self {
			state: JobState::Queued,
			payload: Some(payload),
			submitted_at: Instant::now(),
			started_at: None,
			finished_at: None,
			outcome: None,
		}
	}

	/// How long the job sat in the queue before a worker picked it up
	pub fn queue_latency(&self) -> Duration {
		self.started_at.unwrap_or_else(Instant::now).duration_since(self.submitted_at)
	}

	pub fn view(&self) -> JobStatusView {
		match (&self.state, &self.outcome) {
			(JobState::Queued, _) => JobStatusView::Queued,
			(JobState::Running, _) => JobStatusView::Running,
			(JobState::Completed, Some(Ok(transcript))) => JobStatusView::Completed(transcript.clone()),
			(JobState::Failed, Some(Err(failure))) => JobStatusView::Failed(failure.clone()),
			// Terminal state without a matching outcome cannot be
			// constructed through `finish`
			_ => unreachable!("terminal job without outcome"),
		}
	}
}

/// Generate a collision-free job id
///
/// Monotonic sequence for ordering plus a random suffix so concurrent
/// submissions (or restarts) never collide.
pub(crate) fn job_id(seq: u64) -> String {
	format!("job-{:06}-{}", seq, uuid::Uuid::new_v4().simple())
}
