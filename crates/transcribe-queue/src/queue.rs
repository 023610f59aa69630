use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::{oneshot, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backoff::{QueueStatus, Rejection};
use crate::engine::TranscriptionEngine;
use crate::job::{job_id, JobFailure, JobRecord, JobState, JobStatusView, Transcript};
use crate::worker;

/// Queue and pool sizing
///
/// Defaults match a single-core host: one worker slot, five queue slots.
#[derive(Debug, Clone)]
pub struct QueueConfig {
	/// Worker slots, i.e. maximum simultaneous engine calls
	pub max_workers: usize,
	/// Admitted-but-not-running jobs the queue will hold
	pub max_queue_size: usize,
	/// Processing seconds per second of audio, used only for
	/// `retry_after_seconds` estimates on rejection
	pub estimated_time_per_second_audio: f64,
	/// How long terminal jobs stay pollable before eviction
	pub job_retention: Duration,
	/// Hard cap on retained terminal jobs regardless of age
	pub max_finished_jobs: usize,
}

impl Default for QueueConfig {
	fn default() -> Self {
		Self {
			max_workers: 1,
			max_queue_size: 5,
			estimated_time_per_second_audio: 0.5,
			job_retention: Duration::from_secs(600),
			max_finished_jobs: 256,
		}
	}
}

/// Client contract for a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitMode {
	/// Caller suspends until the job reaches a terminal state
	Sync,
	/// Caller gets a job id back immediately and polls `status`
	Async,
}

/// Successful admission result
#[derive(Debug)]
pub enum SubmitOutcome {
	/// Sync mode: the finished transcript
	Transcript(Transcript),
	/// Async mode: poll `status(job_id)` for progress
	Accepted { job_id: String },
}

#[derive(Debug, Error)]
pub enum SubmitError {
	/// Queue and all worker slots are saturated; retry with backoff
	#[error("service busy: {queued} jobs queued of {capacity} capacity, all workers active", queued = .0.queue_status.queued_jobs, capacity = .0.queue_status.queue_capacity)]
	Busy(Rejection),

	/// Sync mode only: the engine call for this job failed
	#[error("{}", .0.message)]
	Engine(JobFailure),

	/// The queue is shutting down; the job was discarded
	#[error("transcription queue is shut down")]
	Shutdown,
}

/// Read-only occupancy snapshot for health reporting
///
/// Cheap and side-effect free; safe to call while every worker slot is
/// busy (only the snapshot lock is touched).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueHealth {
	pub model_loaded: bool,
	pub max_workers: usize,
	pub active_workers: usize,
	pub queued_jobs: usize,
	pub queue_capacity: usize,
}

/// Monotonic job counters, rolled up in logs at shutdown and read
/// directly by tests; no exporter attached
#[derive(Debug, Default)]
pub struct QueueCounters {
	pub jobs_accepted: AtomicU64,
	pub jobs_rejected: AtomicU64,
	pub jobs_completed: AtomicU64,
	pub jobs_failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterSnapshot {
	pub jobs_accepted: u64,
	pub jobs_rejected: u64,
	pub jobs_completed: u64,
	pub jobs_failed: u64,
}

impl QueueCounters {
	pub fn snapshot(&self) -> CounterSnapshot {
		CounterSnapshot {
			jobs_accepted: self.jobs_accepted.load(Ordering::Relaxed),
			jobs_rejected: self.jobs_rejected.load(Ordering::Relaxed),
			jobs_completed: self.jobs_completed.load(Ordering::Relaxed),
			jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
		}
	}
}

pub(crate) struct JobEntry {
	pub record: JobRecord,
	/// One-shot completion signal for a sync-mode waiter
	pub waiter: Option<oneshot::Sender<Result<Transcript, JobFailure>>>,
}

pub(crate) struct Inner {
	/// Fast-path jobs admitted straight to a free worker slot; never
	/// counted against `max_queue_size` and never reported as queued
	pub handoff: VecDeque<String>,
	/// FIFO of admitted-but-not-running job ids, bounded by
	/// `max_queue_size`
	pub pending: VecDeque<String>,
	/// Status registry: every live job, queued through terminal
	pub jobs: HashMap<String, JobEntry>,
	/// Jobs currently inside an engine call; never exceeds `max_workers`
	pub running: usize,
	/// Terminal job ids in finish order, for retention eviction
	pub finished: VecDeque<String>,
}

/// Admission-controlled transcription queue with a fixed worker pool
///
/// One instance owns all queue/registry state for the process; construct
/// it once at startup and share the `Arc`. All admission, dispatch and
/// status-write operations serialize on a single mutex; workers park on
/// a `Notify` when idle, so an idle queue burns no CPU.
pub struct TranscriptionQueue {
	pub(crate) config: QueueConfig,
	pub(crate) engine: Arc<dyn TranscriptionEngine>,
	pub(crate) inner: Mutex<Inner>,
	pub(crate) job_ready: Notify,
	pub(crate) shutdown_token: CancellationToken,
	pub counters: QueueCounters,
	seq: AtomicU64,
}

impl TranscriptionQueue {
	/// Build the queue and spawn its worker pool
	///
	/// The pool size is fixed for the lifetime of the process; worker
	/// slots survive arbitrary job failures and only exit on `shutdown`.
	pub fn start(config: QueueConfig, engine: Arc<dyn TranscriptionEngine>) -> Arc<Self> {
		info!(
			max_workers = config.max_workers,
			max_queue_size = config.max_queue_size,
			retention_secs = config.job_retention.as_secs(),
			"🏭 Starting transcription queue"
		);

		let queue = Arc::new(Self {
			config,
			engine,
			inner: Mutex::new(Inner {
				handoff: VecDeque::new(),
				pending: VecDeque::new(),
				jobs: HashMap::new(),
				running: 0,
				finished: VecDeque::new(),
			}),
			job_ready: Notify::new(),
			shutdown_token: CancellationToken::new(),
			counters: QueueCounters::default(),
			seq: AtomicU64::new(1),
		});

		worker::spawn_workers(&queue);
		queue
	}

	/// Admit, queue, or reject one transcription request
	///
	/// The accept/reject decision is atomic under the queue lock:
	/// 1. a free worker slot with an empty queue takes the job directly,
	///    bypassing the bounded queue (fast path);
	/// 2. otherwise the job queues if there is room;
	/// 3. otherwise the caller gets a [`Rejection`] with backoff hints.
	///
	/// Sync mode then suspends on the job's completion signal without
	/// consuming a worker slot; async mode returns the job id at once.
	pub async fn submit(&self, payload: Vec<u8>, mode: SubmitMode) -> Result<SubmitOutcome, SubmitError> {
		if self.shutdown_token.is_cancelled() {
			return Err(SubmitError::Shutdown);
		}

		let (id, waiter) = {
			let mut inner = self.inner.lock().expect("queue lock poisoned");
			self.sweep_expired(&mut inner);

			// Handoff entries are committed slots a worker has yet to pick
			// up; counting them keeps the fast path honest under bursts
			let committed = inner.running + inner.handoff.len();
			let fast_path = committed < self.config.max_workers && inner.pending.is_empty();
			if !fast_path && inner.pending.len() >= self.config.max_queue_size {
				let rejection = Rejection::new(
					QueueStatus {
						active_workers: committed,
						queued_jobs: inner.pending.len(),
						queue_capacity: self.config.max_queue_size,
					},
					self.config.max_workers,
					self.config.estimated_time_per_second_audio,
				);
				self.counters.jobs_rejected.fetch_add(1, Ordering::Relaxed);
				warn!(
					active_workers = committed,
					queued_jobs = inner.pending.len(),
					retry_after_seconds = rejection.retry_after_seconds,
					"🚦 Submission rejected, queue saturated"
				);
				return Err(SubmitError::Busy(rejection));
			}

			let id = job_id(self.seq.fetch_add(1, Ordering::Relaxed));
			let mut entry = JobEntry {
				record: JobRecord::new(payload),
				waiter: None,
			};
			let waiter = match mode {
				SubmitMode::Sync => {
					let (tx, rx) = oneshot::channel();
					entry.waiter = Some(tx);
					Some(rx)
				}
				SubmitMode::Async => None,
			};

			if fast_path {
				inner.handoff.push_back(id.clone());
			} else {
				inner.pending.push_back(id.clone());
			}
			inner.jobs.insert(id.clone(), entry);
			self.counters.jobs_accepted.fetch_add(1, Ordering::Relaxed);

			debug!(job_id = %id, queued_jobs = inner.pending.len(), fast_path, "📥 Job admitted");
			(id, waiter)
		};

		// Wake one parked worker; a no-op when all slots are busy
		self.job_ready.notify_one();

		match waiter {
			None => Ok(SubmitOutcome::Accepted { job_id: id }),
			Some(rx) => match rx.await {
				Ok(Ok(transcript)) => Ok(SubmitOutcome::Transcript(transcript)),
				Ok(Err(failure)) => Err(SubmitError::Engine(failure)),
				// Sender dropped without a terminal outcome: shutdown
				Err(_) => Err(SubmitError::Shutdown),
			},
		}
	}

	/// Point-in-time status snapshot for a job id
	///
	/// `None` means unknown OR already evicted; callers must not read it
	/// as a failure.
	pub fn status(&self, job_id: &str) -> Option<JobStatusView> {
		let mut inner = self.inner.lock().expect("queue lock poisoned");
		self.sweep_expired(&mut inner);
		inner.jobs.get(job_id).map(|entry| entry.record.view())
	}

	/// Occupancy snapshot for health reporting
	pub fn health(&self) -> QueueHealth {
		let inner = self.inner.lock().expect("queue lock poisoned");
		QueueHealth {
			model_loaded: self.engine.is_loaded(),
			max_workers: self.config.max_workers,
			active_workers: inner.running + inner.handoff.len(),
			queued_jobs: inner.pending.len(),
			queue_capacity: self.config.max_queue_size,
		}
	}

	/// Stop the worker pool
	///
	/// Queued jobs are discarded and their sync waiters resolved with
	/// [`SubmitError::Shutdown`]. In-flight engine calls cannot be
	/// interrupted; their blocking threads are left to the OS, exactly
	/// as on process exit.
	pub fn shutdown(&self) {
		info!("🛑 Shutting down transcription queue");
		self.shutdown_token.cancel();

		let mut inner = self.inner.lock().expect("queue lock poisoned");
		let discarded = inner.handoff.len() + inner.pending.len();
		while let Some(id) = inner.handoff.pop_front().or_else(|| inner.pending.pop_front()) {
			if let Some(entry) = inner.jobs.get_mut(&id) {
				// Dropping the sender resolves the waiter with Shutdown
				entry.waiter.take();
			}
		}
		if discarded > 0 {
			warn!(discarded, "Discarded queued jobs on shutdown");
		}
	}

	/// Hand the head of the queue to a worker slot
	///
	/// Pop-once: exactly one worker ever sees a given job. The record
	/// transitions to `Running` and gives up its payload here, under the
	/// same lock as admission, so occupancy invariants hold at every
	/// observable instant.
	pub(crate) fn take_next(&self) -> Option<(String, Vec<u8>)> {
		let mut inner = self.inner.lock().expect("queue lock poisoned");
		// Handoff first; its entries were admitted while `pending` was
		// empty, so admission order is preserved
		let id = match inner.handoff.pop_front() {
			Some(id) => id,
			None => inner.pending.pop_front()?,
		};
		inner.running += 1;
		debug_assert!(inner.running <= self.config.max_workers, "running jobs exceed pool size");

		let entry = inner.jobs.get_mut(&id).expect("pending job id missing from registry");
		entry.record.state = JobState::Running;
		entry.record.started_at = Some(Instant::now());
		let payload = entry.record.payload.take().expect("queued job already dispatched");

		let queue_latency_ms = entry.record.queue_latency().as_millis() as u64;
		debug!(job_id = %id, queue_latency_ms, queued_jobs = inner.pending.len(), "⚙️ Job dispatched");

		// More work waiting: chain the wakeup to the next parked worker
		if !inner.handoff.is_empty() || !inner.pending.is_empty() {
			self.job_ready.notify_one();
		}

		Some((id, payload))
	}

	/// Record a terminal outcome and release the worker slot
	pub(crate) fn finish(&self, job_id: &str, outcome: Result<Transcript, JobFailure>) {
		let waiter = {
			let mut inner = self.inner.lock().expect("queue lock poisoned");
			inner.running -= 1;

			let entry = inner.jobs.get_mut(job_id).expect("running job id missing from registry");
			entry.record.state = match &outcome {
				Ok(_) => JobState::Completed,
				Err(_) => JobState::Failed,
			};
			entry.record.finished_at = Some(Instant::now());
			entry.record.outcome = Some(outcome.clone());
			let waiter = entry.waiter.take();
			inner.finished.push_back(job_id.to_string());

			match &outcome {
				Ok(transcript) => {
					self.counters.jobs_completed.fetch_add(1, Ordering::Relaxed);
					info!(job_id = %job_id, duration_s = format!("{:.2}", transcript.duration_s), text_length = transcript.text.len(), "✅ Job completed");
				}
				Err(failure) => {
					self.counters.jobs_failed.fetch_add(1, Ordering::Relaxed);
					warn!(job_id = %job_id, error = %failure.message, "❌ Job failed");
				}
			}

			waiter
		};

		if let Some(tx) = waiter {
			// Waiter may have gone away (client disconnect); not an error
			let _ = tx.send(outcome);
		}
	}

	/// Evict expired terminal registry entries
	///
	/// Inline sweep, called with the lock already held from admission
	/// and status paths. Oldest-terminal first, bounded by both the
	/// retention window and the finished-job cap. Non-terminal entries
	/// are never touched.
	fn sweep_expired(&self, inner: &mut Inner) {
		let mut evicted = 0usize;
		while let Some(id) = inner.finished.front() {
			let over_cap = inner.finished.len() > self.config.max_finished_jobs;
			let expired = inner
				.jobs
				.get(id)
				.and_then(|entry| entry.record.finished_at)
				.is_some_and(|at| at.elapsed() > self.config.job_retention);

			if !over_cap && !expired {
				break;
			}
			let id = inner.finished.pop_front().expect("front checked above");
			inner.jobs.remove(&id);
			evicted += 1;
		}
		if evicted > 0 {
			debug!(evicted, retained = inner.finished.len(), "🧹 Evicted finished jobs");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::engine::EngineError;

	struct EchoEngine;

	impl TranscriptionEngine for EchoEngine {
		fn transcribe(&self, audio: &[u8]) -> Result<String, EngineError> {
			Ok(format!("{} bytes", audio.len()))
		}
	}

	#[test]
	fn test_default_config_matches_single_core_profile() {
		let config = QueueConfig::default();
		assert_eq!(config.max_workers, 1);
		assert_eq!(config.max_queue_size, 5);
		assert!((config.estimated_time_per_second_audio - 0.5).abs() < f64::EPSILON);
	}

	#[tokio::test]
	async fn test_health_on_idle_queue() {
		let queue = TranscriptionQueue::start(QueueConfig::default(), Arc::new(EchoEngine));
		let health = queue.health();
		assert!(health.model_loaded);
		assert_eq!(health.active_workers, 0);
		assert_eq!(health.queued_jobs, 0);
		assert_eq!(health.queue_capacity, 5);
		queue.shutdown();
	}

	#[tokio::test]
	async fn test_sync_submit_round_trip() {
		let queue = TranscriptionQueue::start(QueueConfig::default(), Arc::new(EchoEngine));
		match queue.submit(vec![0u8; 4], SubmitMode::Sync).await {
			Ok(SubmitOutcome::Transcript(t)) => assert_eq!(t.text, "4 bytes"),
			other => panic!("unexpected submit outcome: {other:?}"),
		}
		queue.shutdown();
	}

	#[tokio::test]
	async fn test_submit_after_shutdown_is_rejected() {
		let queue = TranscriptionQueue::start(QueueConfig::default(), Arc::new(EchoEngine));
		queue.shutdown();
		match queue.submit(vec![1], SubmitMode::Async).await {
			Err(SubmitError::Shutdown) => {}
			other => panic!("expected shutdown error, got {other:?}"),
		}
	}
}
