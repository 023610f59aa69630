//! Admission-controlled transcription job queue
//!
//! Accepts short-lived, CPU-bound transcription jobs and runs them under
//! strict concurrency and queue-depth limits so a resource-constrained
//! host (often a single core) is never overrun. Submissions are either
//! dispatched to a free worker slot, queued FIFO, or rejected with
//! structured backoff guidance. Callers pick a blocking (`Sync`) or
//! poll-based (`Async`) contract per submission.
//!
//! The transcription engine itself is a black box behind
//! [`TranscriptionEngine`]; this crate only guarantees it is never
//! invoked with more simultaneous calls than the configured pool size.
//!
//! All state lives in process memory and is lost on restart; there is no
//! persistence, replay, or cross-client fairness beyond FIFO.

mod backoff;
mod engine;
mod job;
mod queue;
mod worker;

pub use backoff::{estimate_retry_after, BackoffStrategy, QueueStatus, Rejection};
pub use engine::{EngineError, TranscriptionEngine};
pub use job::{JobFailure, JobState, JobStatusView, Transcript};
pub use queue::{CounterSnapshot, QueueConfig, QueueCounters, QueueHealth, SubmitError, SubmitMode, SubmitOutcome, TranscriptionQueue};
