// Concurrent batch hashing
// Worker threads pull paths from a shared FIFO queue, each with its own hasher

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::digest::DEFAULT_CHUNK_SIZE;
use super::error::{C4Error, Result};
use super::hasher::{C4Hasher, CancelToken};
use super::id::FileC4Id;

/// Default cap on worker threads.
pub const DEFAULT_MAX_WORKERS: usize = 100;

/// How often idle workers and `join` look at the queue and the stop flag.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Called with each finished identifier, from the worker thread that produced it.
pub type FinishedCallback = Arc<dyn Fn(&FileC4Id) + Send + Sync>;

/// Called with a path just before a worker starts hashing it.
pub type StartedCallback = Arc<dyn Fn(&Path) + Send + Sync>;

/// Called when a file fails to hash. Never called for cancellation.
pub type ErrorCallback = Arc<dyn Fn(&Path, &C4Error) + Send + Sync>;

/// Called from `join` with the percentage of the queue handed out so far.
pub type BatchProgressCallback = Arc<dyn Fn(f64) + Send + Sync>;

/// Lifecycle of a batch session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BatchState {
    /// Accepting paths, no workers yet.
    Idle,
    /// Workers are running.
    Running,
    /// `join` is waiting for the queue to drain.
    Draining,
    /// All workers have exited.
    Joined,
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BatchState::Idle => "idle",
            BatchState::Running => "running",
            BatchState::Draining => "draining",
            BatchState::Joined => "joined",
        };
        f.write_str(name)
    }
}

/// Settings for a [`C4Queue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    pub max_workers: usize,
    pub chunk_size: usize,
    pub poll_interval: Duration,
}

impl BatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(C4Error::invalid_config("max_workers must be at least 1"));
        }
        if self.chunk_size == 0 {
            return Err(C4Error::invalid_config("chunk size must be at least 1 byte"));
        }
        if self.poll_interval.is_zero() {
            return Err(C4Error::invalid_config("poll interval must be non-zero"));
        }
        Ok(())
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Summary of one batch session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchStats {
    pub files_submitted: usize,
    pub files_processed: usize,
    pub files_failed: usize,
    /// Submitted but never hashed because the batch was cancelled.
    pub files_abandoned: usize,
    pub total_bytes: u64,
    pub workers: usize,
    pub cancelled: bool,
    #[serde(serialize_with = "serialize_duration")]
    pub duration: Duration,
}

// Helper function to serialize Duration as seconds
fn serialize_duration<S>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_f64(duration.as_secs_f64())
}

#[derive(Clone, Default)]
struct Callbacks {
    started: Option<StartedCallback>,
    finished: Option<FinishedCallback>,
    error: Option<ErrorCallback>,
}

/// State touched by more than one thread.
#[derive(Default)]
struct Shared {
    hashes: Mutex<HashMap<PathBuf, FileC4Id>>,
    // submitted and not yet completed, failed or abandoned
    outstanding: AtomicUsize,
    processed: AtomicUsize,
    failed: AtomicUsize,
    total_bytes: AtomicU64,
}

impl Shared {
    fn hashes(&self) -> MutexGuard<'_, HashMap<PathBuf, FileC4Id>> {
        self.hashes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Marks one dequeued item as settled when dropped, even if a callback panics.
/// Items still queued behind a panicked worker stay outstanding; `join` notices
/// the dead pool and counts them as abandoned.
struct Settle<'a>(&'a AtomicUsize);

impl Drop for Settle<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Hashes many files at once on a bounded pool of worker threads.
///
/// ```no_run
/// use c4id::c4::{BatchConfig, C4Queue};
///
/// let mut queue = C4Queue::with_config(BatchConfig::new().with_max_workers(8))?
///     .with_finished_callback(|id| println!("{}", id));
/// queue.submit(["a.exr", "b.exr"])?;
/// queue.start()?;
/// let stats = queue.join()?;
/// assert_eq!(queue.results().len(), stats.files_processed);
/// # Ok::<(), c4id::c4::C4Error>(())
/// ```
///
/// Results arrive in whatever order the workers finish. After a cancelled
/// run, some submitted paths will have no result.
pub struct C4Queue {
    config: BatchConfig,
    files: Vec<PathBuf>,
    sender: Option<Sender<PathBuf>>,
    receiver: Receiver<PathBuf>,
    shared: Arc<Shared>,
    stop: CancelToken,
    workers: Vec<JoinHandle<()>>,
    workers_spawned: usize,
    state: BatchState,
    callbacks: Callbacks,
    progress_callback: Option<BatchProgressCallback>,
    started_at: Option<Instant>,
}

impl C4Queue {
    /// Create a queue with default settings (100 workers, 100 MiB chunks)
    pub fn new() -> Self {
        Self::build(BatchConfig::default())
    }

    /// Create a queue with custom settings
    pub fn with_config(config: BatchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: BatchConfig) -> Self {
        let (sender, receiver) = unbounded();
        Self {
            config,
            files: Vec::new(),
            sender: Some(sender),
            receiver,
            shared: Arc::new(Shared::default()),
            stop: CancelToken::new(),
            workers: Vec::new(),
            workers_spawned: 0,
            state: BatchState::Idle,
            callbacks: Callbacks::default(),
            progress_callback: None,
            started_at: None,
        }
    }

    pub fn with_started_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Path) + Send + Sync + 'static,
    {
        self.callbacks.started = Some(Arc::new(callback));
        self
    }

    pub fn with_finished_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&FileC4Id) + Send + Sync + 'static,
    {
        self.callbacks.finished = Some(Arc::new(callback));
        self
    }

    pub fn with_error_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Path, &C4Error) + Send + Sync + 'static,
    {
        self.callbacks.error = Some(Arc::new(callback));
        self
    }

    pub fn with_progress_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    /// Use an existing cancellation flag for this session, e.g. one already
    /// wired to a signal handler. Call before `start`.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.stop = token;
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    /// True once a stop was requested and the session has not been joined yet.
    pub fn is_cancelling(&self) -> bool {
        self.stop.is_cancelled() && self.state != BatchState::Joined
    }

    /// Every path submitted to this session, in submission order.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Paths still waiting in the queue.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Number of worker threads spawned in this session.
    pub fn worker_count(&self) -> usize {
        self.workers_spawned
    }

    /// Queue paths for hashing. Allowed before and while running.
    pub fn submit<I, P>(&mut self, paths: I) -> Result<()>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        if !matches!(self.state, BatchState::Idle | BatchState::Running) {
            return Err(C4Error::InvalidState {
                operation: "submit paths",
                state: self.state,
            });
        }
        let state = self.state;
        let sender = self.sender.as_ref().ok_or(C4Error::InvalidState {
            operation: "submit paths",
            state,
        })?;

        for path in paths {
            let path = path.into();
            self.shared.outstanding.fetch_add(1, Ordering::SeqCst);
            if sender.send(path.clone()).is_err() {
                self.shared.outstanding.fetch_sub(1, Ordering::SeqCst);
                return Err(C4Error::InvalidState {
                    operation: "submit paths",
                    state,
                });
            }
            self.files.push(path);
        }

        if self.state == BatchState::Running {
            self.spawn_workers()?;
        }
        Ok(())
    }

    /// Spawn `min(submitted paths, max_workers)` workers.
    pub fn start(&mut self) -> Result<()> {
        if self.state != BatchState::Idle {
            return Err(C4Error::InvalidState {
                operation: "start",
                state: self.state,
            });
        }
        self.state = BatchState::Running;
        self.started_at = Some(Instant::now());
        self.spawn_workers()
    }

    fn spawn_workers(&mut self) -> Result<()> {
        let target = self.files.len().min(self.config.max_workers);
        while self.workers_spawned < target {
            let worker = Worker {
                index: self.workers_spawned + 1,
                receiver: self.receiver.clone(),
                shared: Arc::clone(&self.shared),
                stop: self.stop.clone(),
                callbacks: self.callbacks.clone(),
                chunk_size: self.config.chunk_size,
                poll_interval: self.config.poll_interval,
            };
            let handle = thread::Builder::new()
                .name(format!("c4-worker-{}", worker.index))
                .spawn(move || worker.run())
                .map_err(|e| C4Error::from_io_error(e, "spawning worker thread", None))?;
            self.workers.push(handle);
            self.workers_spawned += 1;
        }
        Ok(())
    }

    /// Block until every queued path has been processed, or until a stop is
    /// requested, then wait for all workers to exit.
    ///
    /// The queue is polled rather than waited on, so a `stop()` from another
    /// thread is noticed within one poll interval.
    pub fn join(&mut self) -> Result<BatchStats> {
        if self.state != BatchState::Running {
            return Err(C4Error::InvalidState {
                operation: "join",
                state: self.state,
            });
        }
        self.state = BatchState::Draining;

        let total = self.files.len();
        let mut percent = 0.0;
        while !self.stop.is_cancelled() && self.shared.outstanding.load(Ordering::SeqCst) > 0 {
            // Queued paths are only drained by live workers
            if self.workers.iter().all(|handle| handle.is_finished()) {
                warn!(
                    queued = self.receiver.len(),
                    "every worker exited with work still queued"
                );
                break;
            }
            thread::sleep(self.config.poll_interval);
            if total == 0 {
                continue;
            }
            if let Some(callback) = &self.progress_callback {
                let remaining = self.receiver.len() as f64;
                let new_percent = 100.0 * (1.0 - remaining / total as f64);
                if new_percent != percent {
                    percent = new_percent;
                    callback(percent);
                }
            }
        }

        let cancelled = self.stop.is_cancelled();
        if cancelled {
            debug!("batch cancelled, waiting for workers to exit");
        }
        self.shutdown_workers();

        // Whatever is still queued was never handed to a worker.
        self.receiver.try_iter().for_each(drop);
        let processed = self.shared.processed.load(Ordering::SeqCst);
        let failed = self.shared.failed.load(Ordering::SeqCst);
        let stats = BatchStats {
            files_submitted: total,
            files_processed: processed,
            files_failed: failed,
            files_abandoned: total.saturating_sub(processed + failed),
            total_bytes: self.shared.total_bytes.load(Ordering::SeqCst),
            workers: self.workers_spawned,
            cancelled,
            duration: self.started_at.map(|t| t.elapsed()).unwrap_or_default(),
        };
        self.state = BatchState::Joined;

        info!(
            processed = stats.files_processed,
            failed = stats.files_failed,
            abandoned = stats.files_abandoned,
            bytes = stats.total_bytes,
            workers = stats.workers,
            cancelled = stats.cancelled,
            "batch finished in {:.2}s",
            stats.duration.as_secs_f64()
        );
        Ok(stats)
    }

    fn shutdown_workers(&mut self) {
        // Disconnecting the queue lets idle workers exit once it is empty.
        self.sender.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("worker thread panicked");
            }
        }
    }

    /// Request cancellation. Idempotent and safe from any thread.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// A handle that stops this session when cancelled, for use from
    /// other threads (signal handlers, UI).
    pub fn stop_handle(&self) -> CancelToken {
        self.stop.clone()
    }

    /// Snapshot of the results gathered so far.
    pub fn results(&self) -> HashMap<PathBuf, FileC4Id> {
        self.shared.hashes().clone()
    }

    /// Move the results out, leaving the map empty.
    pub fn take_results(&mut self) -> HashMap<PathBuf, FileC4Id> {
        std::mem::take(&mut *self.shared.hashes())
    }

    pub fn get(&self, path: &Path) -> Option<FileC4Id> {
        self.shared.hashes().get(path).cloned()
    }

    /// Return a joined (or never started) session to `Idle` with a fresh
    /// queue, results map and stop flag. Handles from `stop_handle` taken
    /// before the reset no longer affect the session.
    pub fn reset(&mut self) -> Result<()> {
        if !matches!(self.state, BatchState::Idle | BatchState::Joined) {
            return Err(C4Error::InvalidState {
                operation: "reset",
                state: self.state,
            });
        }
        let callbacks = std::mem::take(&mut self.callbacks);
        let progress_callback = self.progress_callback.take();
        *self = Self::build(self.config);
        self.callbacks = callbacks;
        self.progress_callback = progress_callback;
        Ok(())
    }
}

impl Default for C4Queue {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for C4Queue {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            self.stop();
            self.shutdown_workers();
        }
    }
}

struct Worker {
    index: usize,
    receiver: Receiver<PathBuf>,
    shared: Arc<Shared>,
    stop: CancelToken,
    callbacks: Callbacks,
    chunk_size: usize,
    poll_interval: Duration,
}

impl Worker {
    fn run(self) {
        let mut hasher = match C4Hasher::with_chunk_size(self.chunk_size) {
            Ok(hasher) => hasher,
            Err(e) => {
                warn!(worker = self.index, "cannot create hasher: {}", e);
                return;
            }
        };
        debug!(worker = self.index, "worker started");

        while !self.stop.is_cancelled() {
            let path = match self.receiver.recv_timeout(self.poll_interval) {
                Ok(path) => path,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };
            let _settle = Settle(&self.shared.outstanding);

            if self.stop.is_cancelled() {
                debug!(worker = self.index, path = %path.display(), "abandoned before hashing");
                break;
            }
            if !self.process(&mut hasher, path) {
                break;
            }
        }

        debug!(worker = self.index, "worker stopped");
    }

    /// Hash one path. Returns false when the worker should exit.
    fn process(&self, hasher: &mut C4Hasher, path: PathBuf) -> bool {
        if let Some(callback) = &self.callbacks.started {
            callback(&path);
        }
        debug!(worker = self.index, path = %path.display(), "hashing");

        match hasher.hash_file_until(&path, &self.stop) {
            Ok(id) => {
                self.shared.total_bytes.fetch_add(id.bytes(), Ordering::SeqCst);
                self.shared.hashes().insert(path, id.clone());
                self.shared.processed.fetch_add(1, Ordering::SeqCst);
                if let Some(callback) = &self.callbacks.finished {
                    callback(&id);
                }
                true
            }
            Err(e) if e.is_incomplete() => {
                debug!(worker = self.index, path = %path.display(), "abandoned mid-hash");
                false
            }
            Err(e) => {
                warn!(worker = self.index, path = %path.display(), "failed to hash: {}", e);
                self.shared.failed.fetch_add(1, Ordering::SeqCst);
                if let Some(callback) = &self.callbacks.error {
                    callback(&path, &e);
                }
                true
            }
        }
    }
}
