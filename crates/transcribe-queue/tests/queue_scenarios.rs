//! End-to-end queue behavior: admission, FIFO dispatch, backpressure,
//! failure isolation, retention, and shutdown. Engine stand-ins are
//! deterministic (token-gated or immediate), no real audio involved.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use transcribe_queue::{EngineError, JobStatusView, QueueConfig, SubmitError, SubmitMode, SubmitOutcome, TranscriptionEngine, TranscriptionQueue};

/// Engine that blocks each call until the test sends a release token
///
/// `transcribe` runs on the blocking thread pool, so a std channel recv
/// is safe here. Records the first payload byte of each call in arrival
/// order. A dropped sender releases everything (test teardown).
struct GatedEngine {
	gate: Mutex<mpsc::Receiver<()>>,
	seen: Mutex<Vec<u8>>,
}

impl GatedEngine {
	fn new() -> (Arc<Self>, mpsc::Sender<()>) {
		let (tx, rx) = mpsc::channel();
		let engine = Arc::new(Self {
			gate: Mutex::new(rx),
			seen: Mutex::new(Vec::new()),
		});
		(engine, tx)
	}

	fn seen(&self) -> Vec<u8> {
		self.seen.lock().unwrap().clone()
	}
}

impl TranscriptionEngine for GatedEngine {
	fn transcribe(&self, audio: &[u8]) -> Result<String, EngineError> {
		self.seen.lock().unwrap().push(audio.first().copied().unwrap_or(0));
		let _ = self.gate.lock().unwrap().recv();
		Ok(format!("transcript {}", audio.first().copied().unwrap_or(0)))
	}
}

/// Immediate engine; payloads starting with `FAIL` error out
struct FlakyEngine;

impl TranscriptionEngine for FlakyEngine {
	fn transcribe(&self, audio: &[u8]) -> Result<String, EngineError> {
		if audio.starts_with(b"FAIL") {
			Err(EngineError::Transcription("unreadable audio".into()))
		} else {
			Ok("ok".into())
		}
	}
}

/// Slow engine that tracks peak concurrent calls
struct TrackingEngine {
	current: AtomicUsize,
	peak: AtomicUsize,
}

impl TrackingEngine {
	fn new() -> Arc<Self> {
		Arc::new(Self {
			current: AtomicUsize::new(0),
			peak: AtomicUsize::new(0),
		})
	}
}

impl TranscriptionEngine for TrackingEngine {
	fn transcribe(&self, _audio: &[u8]) -> Result<String, EngineError> {
		let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
		self.peak.fetch_max(now, Ordering::SeqCst);
		std::thread::sleep(Duration::from_millis(25));
		self.current.fetch_sub(1, Ordering::SeqCst);
		Ok("tracked".into())
	}
}

async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
	for _ in 0..400 {
		if condition() {
			return;
		}
		tokio::time::sleep(Duration::from_millis(5)).await;
	}
	panic!("timed out waiting for: {what}");
}

fn config(max_workers: usize, max_queue_size: usize) -> QueueConfig {
	QueueConfig {
		max_workers,
		max_queue_size,
		..QueueConfig::default()
	}
}

fn submit_task(queue: &Arc<TranscriptionQueue>, payload: Vec<u8>, mode: SubmitMode) -> tokio::task::JoinHandle<Result<SubmitOutcome, SubmitError>> {
	let queue = Arc::clone(queue);
	tokio::spawn(async move { queue.submit(payload, mode).await })
}

/// Pool of 1, queue of 2, four sync submissions: one runs, two queue,
/// the fourth is rejected with a populated backoff descriptor.
#[tokio::test]
async fn test_saturation_rejects_with_backoff() {
	let (engine, release) = GatedEngine::new();
	let queue = TranscriptionQueue::start(config(1, 2), engine);

	let first = submit_task(&queue, vec![1], SubmitMode::Sync);
	{
		let q = Arc::clone(&queue);
		wait_until("first job running", move || {
			let h = q.health();
			h.active_workers == 1 && h.queued_jobs == 0
		})
		.await;
	}

	let second = submit_task(&queue, vec![2], SubmitMode::Sync);
	let third = submit_task(&queue, vec![3], SubmitMode::Sync);
	{
		let q = Arc::clone(&queue);
		wait_until("two jobs queued", move || q.health().queued_jobs == 2).await;
	}

	match queue.submit(vec![4], SubmitMode::Sync).await {
		Err(SubmitError::Busy(rejection)) => {
			assert_eq!(rejection.queue_status.active_workers, 1);
			assert_eq!(rejection.queue_status.queued_jobs, 2);
			assert_eq!(rejection.queue_status.queue_capacity, 2);
			assert!(rejection.retry_after_seconds >= 1);
			assert_eq!(rejection.backoff_strategy.kind, "exponential");
			assert!(rejection.backoff_strategy.initial_delay < rejection.backoff_strategy.max_delay);
		}
		other => panic!("expected busy rejection, got {other:?}"),
	}

	for _ in 0..3 {
		release.send(()).unwrap();
	}
	for handle in [first, second, third] {
		match tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap() {
			Ok(SubmitOutcome::Transcript(t)) => assert!(t.text.starts_with("transcript")),
			other => panic!("expected transcript, got {other:?}"),
		}
	}

	let counters = queue.counters.snapshot();
	assert_eq!(counters.jobs_accepted, 3);
	assert_eq!(counters.jobs_rejected, 1);
	assert_eq!(counters.jobs_completed, 3);

	queue.shutdown();
}

/// A fast-path admission occupies a worker slot, never the queue: even
/// with zero queue capacity the occupancy report stays within bounds.
#[tokio::test]
async fn test_fast_path_never_counts_as_queued() {
	let (engine, release) = GatedEngine::new();
	let queue = TranscriptionQueue::start(config(1, 0), engine);

	let accepted = submit_task(&queue, vec![1], SubmitMode::Sync);
	{
		let q = Arc::clone(&queue);
		wait_until("worker slot occupied", move || q.health().active_workers == 1).await;
	}

	let health = queue.health();
	assert_eq!(health.queued_jobs, 0, "fast-path job must not report as queued");
	assert_eq!(health.queue_capacity, 0);

	match queue.submit(vec![2], SubmitMode::Sync).await {
		Err(SubmitError::Busy(rejection)) => {
			assert_eq!(rejection.queue_status.active_workers, 1);
			assert_eq!(rejection.queue_status.queued_jobs, 0);
			assert_eq!(rejection.queue_status.queue_capacity, 0);
		}
		other => panic!("expected busy rejection, got {other:?}"),
	}

	release.send(()).unwrap();
	match tokio::time::timeout(Duration::from_secs(5), accepted).await.unwrap().unwrap() {
		Ok(SubmitOutcome::Transcript(_)) => {}
		other => panic!("expected transcript, got {other:?}"),
	}

	queue.shutdown();
}

/// Health snapshot while one job runs and two are queued
#[tokio::test]
async fn test_health_snapshot_under_load() {
	let (engine, release) = GatedEngine::new();
	let queue = TranscriptionQueue::start(config(1, 5), engine);

	let _running = submit_task(&queue, vec![1], SubmitMode::Sync);
	{
		let q = Arc::clone(&queue);
		wait_until("job running", move || q.health().active_workers == 1).await;
	}
	let _q1 = submit_task(&queue, vec![2], SubmitMode::Sync);
	let _q2 = submit_task(&queue, vec![3], SubmitMode::Sync);
	{
		let q = Arc::clone(&queue);
		wait_until("two queued", move || q.health().queued_jobs == 2).await;
	}

	let health = queue.health();
	assert!(health.model_loaded);
	assert_eq!(health.max_workers, 1);
	assert_eq!(health.active_workers, 1);
	assert_eq!(health.queued_jobs, 2);
	assert_eq!(health.queue_capacity, 5);

	drop(release);
	queue.shutdown();
}

/// Async contract: submit returns an id immediately; polling observes
/// queued/processing and then a stable terminal result.
#[tokio::test]
async fn test_async_poll_lifecycle() {
	let (engine, release) = GatedEngine::new();
	let queue = TranscriptionQueue::start(config(1, 5), engine);

	let job_id = match queue.submit(vec![7], SubmitMode::Async).await {
		Ok(SubmitOutcome::Accepted { job_id }) => job_id,
		other => panic!("expected accepted, got {other:?}"),
	};

	// Immediately after admission: queued or already picked up
	match queue.status(&job_id) {
		Some(JobStatusView::Queued | JobStatusView::Running) => {}
		other => panic!("unexpected early status: {other:?}"),
	}

	{
		let q = Arc::clone(&queue);
		let id = job_id.clone();
		wait_until("job running", move || matches!(q.status(&id), Some(JobStatusView::Running))).await;
	}

	release.send(()).unwrap();
	{
		let q = Arc::clone(&queue);
		let id = job_id.clone();
		wait_until("job complete", move || matches!(q.status(&id), Some(JobStatusView::Completed(_)))).await;
	}

	// Terminal reads are idempotent until eviction
	let first = queue.status(&job_id);
	for _ in 0..3 {
		assert_eq!(queue.status(&job_id), first);
	}
	match first {
		Some(JobStatusView::Completed(t)) => {
			assert_eq!(t.text, "transcript 7");
			assert!(t.duration_s >= 0.0);
		}
		other => panic!("expected completed, got {other:?}"),
	}

	queue.shutdown();
}

/// Jobs reach the worker in strict admission order
#[tokio::test]
async fn test_fifo_dispatch_order() {
	let (engine, release) = GatedEngine::new();
	let queue = TranscriptionQueue::start(config(1, 5), engine.clone());

	let mut ids = Vec::new();
	for n in 1..=4u8 {
		match queue.submit(vec![n], SubmitMode::Async).await {
			Ok(SubmitOutcome::Accepted { job_id }) => ids.push(job_id),
			other => panic!("submission {n} not accepted: {other:?}"),
		}
	}

	for _ in 0..4 {
		release.send(()).unwrap();
	}
	{
		let q = Arc::clone(&queue);
		wait_until("all jobs terminal", move || q.counters.snapshot().jobs_completed == 4).await;
	}

	assert_eq!(engine.seen(), vec![1, 2, 3, 4]);
	queue.shutdown();
}

/// One failing job among several does not poison the pool or its peers
#[tokio::test]
async fn test_engine_failure_is_isolated() {
	let queue = TranscriptionQueue::start(config(1, 5), Arc::new(FlakyEngine));

	match queue.submit(b"good one".to_vec(), SubmitMode::Sync).await {
		Ok(SubmitOutcome::Transcript(t)) => assert_eq!(t.text, "ok"),
		other => panic!("expected transcript, got {other:?}"),
	}

	match queue.submit(b"FAIL this".to_vec(), SubmitMode::Sync).await {
		Err(SubmitError::Engine(failure)) => {
			assert_eq!(failure.code, "engine_error");
			assert!(failure.message.contains("unreadable audio"));
		}
		other => panic!("expected engine error, got {other:?}"),
	}

	// Pool stays usable after the failure
	match queue.submit(b"good two".to_vec(), SubmitMode::Sync).await {
		Ok(SubmitOutcome::Transcript(t)) => assert_eq!(t.text, "ok"),
		other => panic!("expected transcript, got {other:?}"),
	}

	let counters = queue.counters.snapshot();
	assert_eq!(counters.jobs_completed, 2);
	assert_eq!(counters.jobs_failed, 1);

	queue.shutdown();
}

/// Async variant: a failed job polls as failed with a classified error
#[tokio::test]
async fn test_failed_job_polls_as_failed() {
	let queue = TranscriptionQueue::start(config(1, 5), Arc::new(FlakyEngine));

	let job_id = match queue.submit(b"FAIL async".to_vec(), SubmitMode::Async).await {
		Ok(SubmitOutcome::Accepted { job_id }) => job_id,
		other => panic!("expected accepted, got {other:?}"),
	};

	{
		let q = Arc::clone(&queue);
		let id = job_id.clone();
		wait_until("job failed", move || matches!(q.status(&id), Some(JobStatusView::Failed(_)))).await;
	}

	match queue.status(&job_id) {
		Some(JobStatusView::Failed(failure)) => assert_eq!(failure.code, "engine_error"),
		other => panic!("expected failed view, got {other:?}"),
	}

	queue.shutdown();
}

/// Running jobs never exceed the configured pool size
#[tokio::test]
async fn test_concurrency_limit_respected() {
	let engine = TrackingEngine::new();
	let queue = TranscriptionQueue::start(config(2, 6), engine.clone());

	let mut accepted = 0u64;
	for n in 0..8u8 {
		if queue.submit(vec![n], SubmitMode::Async).await.is_ok() {
			accepted += 1;
		}
	}
	assert!(accepted >= 2, "at least the fast-path submissions must land");

	{
		let q = Arc::clone(&queue);
		wait_until("all accepted jobs terminal", move || {
			let c = q.counters.snapshot();
			c.jobs_completed + c.jobs_failed == accepted
		})
		.await;
	}

	assert!(engine.peak.load(Ordering::SeqCst) <= 2, "engine saw more than 2 simultaneous calls");
	queue.shutdown();
}

/// Terminal entries are evicted once the finished-job cap is exceeded;
/// a lookup after eviction is a registry miss, not a failure.
#[tokio::test]
async fn test_retention_count_cap() {
	let queue = TranscriptionQueue::start(
		QueueConfig {
			max_workers: 1,
			max_queue_size: 5,
			max_finished_jobs: 1,
			..QueueConfig::default()
		},
		Arc::new(FlakyEngine),
	);

	let mut ids = Vec::new();
	for n in 0..2u8 {
		match queue.submit(vec![n], SubmitMode::Async).await {
			Ok(SubmitOutcome::Accepted { job_id }) => ids.push(job_id),
			other => panic!("not accepted: {other:?}"),
		}
		let q = Arc::clone(&queue);
		wait_until("job terminal", move || q.counters.snapshot().jobs_completed == u64::from(n) + 1).await;
	}

	assert_eq!(queue.status(&ids[0]), None, "oldest terminal job should be evicted");
	assert!(matches!(queue.status(&ids[1]), Some(JobStatusView::Completed(_))));

	queue.shutdown();
}

/// A zero retention window evicts terminal jobs on the next sweep
#[tokio::test]
async fn test_retention_window() {
	let queue = TranscriptionQueue::start(
		QueueConfig {
			max_workers: 1,
			max_queue_size: 5,
			job_retention: Duration::ZERO,
			..QueueConfig::default()
		},
		Arc::new(FlakyEngine),
	);

	let job_id = match queue.submit(vec![9], SubmitMode::Async).await {
		Ok(SubmitOutcome::Accepted { job_id }) => job_id,
		other => panic!("not accepted: {other:?}"),
	};
	{
		let q = Arc::clone(&queue);
		wait_until("job terminal", move || q.counters.snapshot().jobs_completed == 1).await;
	}

	tokio::time::sleep(Duration::from_millis(10)).await;
	assert_eq!(queue.status(&job_id), None);

	queue.shutdown();
}

#[tokio::test]
async fn test_unknown_job_id_is_none() {
	let queue = TranscriptionQueue::start(config(1, 5), Arc::new(FlakyEngine));
	assert_eq!(queue.status("job-999999-doesnotexist"), None);
	queue.shutdown();
}

/// Shutdown resolves queued sync waiters instead of hanging them;
/// the in-flight job still finishes.
#[tokio::test]
async fn test_shutdown_resolves_queued_waiters() {
	let (engine, release) = GatedEngine::new();
	let queue = TranscriptionQueue::start(config(1, 2), engine);

	let running = submit_task(&queue, vec![1], SubmitMode::Sync);
	{
		let q = Arc::clone(&queue);
		wait_until("first job running", move || q.health().active_workers == 1).await;
	}
	let queued = submit_task(&queue, vec![2], SubmitMode::Sync);
	{
		let q = Arc::clone(&queue);
		wait_until("second job queued", move || q.health().queued_jobs == 1).await;
	}

	queue.shutdown();

	match tokio::time::timeout(Duration::from_secs(5), queued).await.unwrap().unwrap() {
		Err(SubmitError::Shutdown) => {}
		other => panic!("expected shutdown error for queued job, got {other:?}"),
	}

	// The job already inside the engine call completes normally
	release.send(()).unwrap();
	match tokio::time::timeout(Duration::from_secs(5), running).await.unwrap().unwrap() {
		Ok(SubmitOutcome::Transcript(_)) => {}
		other => panic!("expected transcript for in-flight job, got {other:?}"),
	}
}
