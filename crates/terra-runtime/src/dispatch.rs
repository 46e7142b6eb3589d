use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread;

use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};

use crate::cancel::CancelToken;
use crate::relay::{PendingResult, ResultSender};

/// Fixed-size worker pool. Jobs queue inside the pool until a worker frees up;
/// each finished job lands in the relay it was submitted with.
pub struct WorkDispatcher {
    pool: Arc<ThreadPool>,
    queued: Arc<AtomicUsize>,
    inflight: Arc<AtomicUsize>,
    next_id: AtomicU64,
    workers: usize,
}

impl WorkDispatcher {
    /// `workers == 0` sizes the pool from the machine, leaving one core for
    /// the driving thread.
    pub fn new(workers: usize) -> Result<Self, ThreadPoolBuildError> {
        let workers = if workers == 0 {
            default_worker_count()
        } else {
            workers
        };
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("terra-gen-{i}"))
            .panic_handler(|payload| {
                log::error!("generation job panicked: {}", panic_message(&*payload));
            })
            .build()?;
        log::info!("work dispatcher started with {workers} worker(s)");
        Ok(Self {
            pool: Arc::new(pool),
            queued: Arc::new(AtomicUsize::new(0)),
            inflight: Arc::new(AtomicUsize::new(0)),
            next_id: AtomicU64::new(1),
            workers,
        })
    }

    #[inline]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Runs `work` on a pool thread and deposits `Some(value)` with
    /// `continuation` into `relay`. `None` (cancelled or failed work)
    /// deposits nothing. Returns the request id used in logs.
    pub fn submit<T, W, C>(
        &self,
        relay: &ResultSender<T>,
        cancel: CancelToken,
        work: W,
        continuation: C,
    ) -> u64
    where
        T: Send + 'static,
        W: FnOnce(&CancelToken) -> Option<T> + Send + 'static,
        C: FnOnce(T) + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let relay = relay.clone();
        let queued = Arc::clone(&self.queued);
        let inflight = Arc::clone(&self.inflight);
        queued.fetch_add(1, Ordering::SeqCst);
        self.pool.spawn(move || {
            let _running = InflightGuard::enter(&inflight);
            queued.fetch_sub(1, Ordering::SeqCst);
            if cancel.is_cancelled() {
                log::debug!("job {id:#x} skipped: cancelled before start");
                return;
            }
            if let Some(value) = work(&cancel) {
                relay.deposit(PendingResult::new(id, value, Box::new(continuation), cancel));
            }
        });
        id
    }

    /// `(queued, running)` job counts.
    pub fn queue_debug_counts(&self) -> (usize, usize) {
        (
            self.queued.load(Ordering::SeqCst),
            self.inflight.load(Ordering::SeqCst),
        )
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.queue_debug_counts() == (0, 0)
    }
}

// Decrements on drop so a panicking job still leaves the counters balanced.
struct InflightGuard<'a>(&'a AtomicUsize);

impl<'a> InflightGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn default_worker_count() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(8)
        .saturating_sub(1)
        .max(1)
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
