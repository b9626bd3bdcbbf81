//! Background thread pool for frame decoding.
//!
//! Uses work-stealing deques:
//! - Jobs enter through a global injector
//! - Idle workers steal from each other
//!
//! Each job carries the epoch it was queued under. Bumping the shared epoch
//! (scene teardown) makes every still-queued job a no-op.

use crossbeam::deque::{Injector, Stealer, Worker};
use log::trace;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Worker pool with work-stealing.
///
/// # Example
/// ```ignore
/// let workers = Workers::new(4, cache.epoch_ref());
/// workers.execute_with_epoch(cache.epoch(), move || slot.decode());
/// ```
pub struct Workers {
    injector: Arc<Injector<Job>>,
    handles: Vec<thread::JoinHandle<()>>,
    current_epoch: Arc<AtomicU64>,
    shutdown: Arc<AtomicBool>,
}

impl std::fmt::Debug for Workers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workers")
            .field("threads", &self.handles.len())
            .field("epoch", &self.current_epoch())
            .finish()
    }
}

impl Workers {
    /// Create worker pool sharing `epoch` with the cache it decodes for.
    ///
    /// Recommended: `num_cpus::get() * 3 / 4` (leave headroom for the UI thread).
    pub fn new(num_threads: usize, epoch: Arc<AtomicU64>) -> Self {
        let num_threads = num_threads.max(1);
        let injector: Arc<Injector<Job>> = Arc::new(Injector::new());
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut locals: Vec<Worker<Job>> = Vec::with_capacity(num_threads);
        let mut stealers: Vec<Stealer<Job>> = Vec::with_capacity(num_threads);
        for _ in 0..num_threads {
            let worker = Worker::new_fifo();
            stealers.push(worker.stealer());
            locals.push(worker);
        }

        let mut handles = Vec::with_capacity(num_threads);
        for (worker_id, worker) in locals.into_iter().enumerate() {
            let injector = Arc::clone(&injector);
            let shutdown = Arc::clone(&shutdown);
            let stealers = stealers.clone();

            let spawned = thread::Builder::new()
                .name(format!("scrollreel-decode-{}", worker_id))
                .spawn(move || {
                    trace!("Worker {} started", worker_id);
                    loop {
                        if let Some(job) = worker.pop() {
                            job();
                            continue;
                        }
                        if let Some(job) = injector.steal_batch_and_pop(&worker).success() {
                            job();
                            continue;
                        }
                        if let Some(job) = stealers.iter().find_map(|s| s.steal().success()) {
                            job();
                            continue;
                        }
                        if shutdown.load(Ordering::Relaxed) {
                            break;
                        }
                        thread::sleep(Duration::from_millis(1));
                    }
                    trace!("Worker {} stopped", worker_id);
                });

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => log::error!("Failed to spawn decode worker {}: {}", worker_id, e),
            }
        }

        trace!("Workers initialized: {} threads", handles.len());

        Self {
            injector,
            handles,
            current_epoch: epoch,
            shutdown,
        }
    }

    /// Number of live worker threads
    pub fn threads(&self) -> usize {
        self.handles.len()
    }

    /// Queue a job unconditionally.
    pub fn execute<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.injector.push(Box::new(f));
    }

    pub fn current_epoch(&self) -> u64 {
        self.current_epoch.load(Ordering::Relaxed)
    }

    /// Queue a job that is skipped if the epoch moved on before a worker picks it up.
    pub fn execute_with_epoch<F>(&self, epoch: u64, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let current_epoch = Arc::clone(&self.current_epoch);
        self.injector.push(Box::new(move || {
            if current_epoch.load(Ordering::Relaxed) == epoch {
                f();
            }
        }));
    }
}

impl Drop for Workers {
    fn drop(&mut self) {
        use std::time::Instant;

        let num_threads = self.handles.len();
        trace!("Workers shutting down ({} threads)...", num_threads);
        self.shutdown.store(true, Ordering::SeqCst);

        // Queued jobs still drain before a worker sees the flag; cap the wait.
        let deadline = Instant::now() + Duration::from_millis(500);
        for handle in std::mem::take(&mut self.handles) {
            while !handle.is_finished() {
                if Instant::now() >= deadline {
                    trace!("Shutdown timeout reached, detaching remaining workers");
                    return;
                }
                thread::sleep(Duration::from_millis(1));
            }
            let _ = handle.join();
        }
        trace!("All {} workers stopped", num_threads);
    }
}
