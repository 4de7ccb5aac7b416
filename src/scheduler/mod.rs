//! Priority request scheduler with result caching.
//!
//! [`RequestScheduler`] runs named asynchronous operations on a fixed pool of
//! `max_concurrent` worker tasks. Work waiting for a worker sits in a priority
//! queue: higher priority first, then submission order.
//!
//! # Flow
//!
//! ```text
//! submit(id, op, options)
//!        │
//!        ▼
//!   use_cache && cache has id? ── yes ──► Scheduled (ready, cached value)
//!        │ no
//!        ▼
//!   ┌──────────────┐   notify   ┌────────────────────────┐
//!   │ BinaryHeap   │ ─────────► │ worker 0..max_concurrent│
//!   │ (prio, seq)  │            └───────────┬────────────┘
//!   └──────────────┘                        │ run op (optional deadline)
//!                                           ▼
//!                        Ok + use_cache ─► TtlCache.insert(id)
//!                                           │
//!                                           ▼
//!                               oneshot ─► Scheduled resolves
//! ```
//!
//! # Failure isolation
//!
//! An operation's error (or panic, or missed deadline) goes to its own caller
//! only. Nothing is cached for it and the workers keep draining the queue.
//!
//! # Cancellation
//!
//! There is none. Dropping a [`Scheduled`] stops waiting for the result but
//! the operation still runs to completion. [`ScheduleOptions::timeout`] is
//! the only way to bound an operation.

mod queue;

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use tokio::sync::{Notify, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use self::queue::{Job, JobQueue, Operation};
use crate::cache::TtlCache;
use crate::telemetry;
use crate::{MizanError, Result};

/// Scheduler-wide settings.
///
/// ```rust
/// # use mizan::scheduler::SchedulerConfig;
/// # use std::time::Duration;
/// let config = SchedulerConfig::new()
///     .max_concurrent(8)
///     .cache_ttl(Duration::from_secs(60));
/// ```
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Number of worker tasks, i.e. operations that may run at once. Default: 3.
    pub max_concurrent: usize,
    /// TTL for cached results when the caller does not set one. Default: 5 minutes.
    pub cache_ttl: Duration,
    /// Priority for callers that do not set one. Default: 1.
    pub default_priority: i32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            cache_ttl: Duration::from_secs(300),
            default_priority: 1,
        }
    }
}

impl SchedulerConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of concurrently executing operations.
    pub fn max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }

    /// Set the default result TTL.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Set the default priority.
    pub fn default_priority(mut self, priority: i32) -> Self {
        self.default_priority = priority;
        self
    }
}

/// Per-request options.
///
/// Unset fields fall back to the scheduler's [`SchedulerConfig`].
#[derive(Debug, Clone)]
pub struct ScheduleOptions {
    pub priority: Option<i32>,
    /// Serve from and store into the cache. Default: true.
    pub use_cache: bool,
    pub cache_ttl: Option<Duration>,
    /// Deadline for the operation's execution (queue wait excluded).
    /// Default: none.
    pub timeout: Option<Duration>,
}

impl Default for ScheduleOptions {
    fn default() -> Self {
        Self {
            priority: None,
            use_cache: true,
            cache_ttl: None,
            timeout: None,
        }
    }
}

impl ScheduleOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn use_cache(mut self, enabled: bool) -> Self {
        self.use_cache = enabled;
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    pub fn timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }
}

/// Queue occupancy at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStats {
    pub queued: usize,
    pub active: usize,
    pub max_concurrent: usize,
}

struct Shared<T> {
    queue: Mutex<JobQueue<T>>,
    notify: Notify,
    cache: Arc<TtlCache<T>>,
    active: AtomicUsize,
}

impl<T: Clone + Send + 'static> Shared<T> {
    fn lock_queue(&self) -> MutexGuard<'_, JobQueue<T>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn execute(&self, job: Job<T>) {
        let Job {
            id,
            use_cache,
            cache_ttl,
            timeout,
            operation,
            reply,
            ..
        } = job;

        self.active.fetch_add(1, Ordering::SeqCst);
        let start = Instant::now();
        let result = run_guarded(operation, timeout).await;
        let elapsed = start.elapsed().as_secs_f64();

        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(telemetry::OPERATIONS_TOTAL, "status" => status).increment(1);
        metrics::histogram!(telemetry::OPERATION_DURATION_SECONDS).record(elapsed);

        match &result {
            Ok(value) => {
                debug!(id = %id, elapsed_secs = elapsed, "operation completed");
                if use_cache {
                    self.cache.insert_with_ttl(id.clone(), value.clone(), cache_ttl);
                }
            }
            Err(e) => warn!(id = %id, error = %e, "operation failed"),
        }

        if reply.send(result).is_err() {
            debug!(id = %id, "caller went away before the result was ready");
        }
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Run an operation, turning panics and missed deadlines into errors.
async fn run_guarded<T>(operation: Operation<T>, timeout: Option<Duration>) -> Result<T> {
    let guarded = AssertUnwindSafe(async move { operation().await }).catch_unwind();
    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, guarded).await {
            Ok(outcome) => outcome,
            Err(_) => return Err(MizanError::Timeout(limit)),
        },
        None => guarded.await,
    };
    outcome.unwrap_or_else(|payload| Err(MizanError::OperationPanicked(panic_message(&*payload))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

async fn worker_loop<T: Clone + Send + 'static>(shared: Arc<Shared<T>>, worker: usize) {
    debug!(worker, "scheduler worker started");
    loop {
        // Register interest before inspecting the queue so a push that lands
        // in between is not missed.
        let mut notified = std::pin::pin!(shared.notify.notified());
        notified.as_mut().enable();

        let (job, closed) = {
            let mut queue = shared.lock_queue();
            let job = queue.pop();
            metrics::gauge!(telemetry::QUEUE_DEPTH).set(queue.len() as f64);
            (job, queue.is_closed())
        };

        match job {
            Some(job) => shared.execute(job).await,
            None if closed => break,
            None => notified.await,
        }
    }
    debug!(worker, "scheduler worker stopped");
}

/// Fixed-size worker pool draining a priority queue, fronted by a [`TtlCache`].
///
/// Construct once and share by reference (or `Arc`). Dropping the scheduler
/// closes it: already-queued work still drains, then the workers exit.
pub struct RequestScheduler<T> {
    shared: Arc<Shared<T>>,
    config: SchedulerConfig,
    workers: Vec<JoinHandle<()>>,
}

impl<T: Clone + Send + Sync + 'static> RequestScheduler<T> {
    /// Start `config.max_concurrent` workers (at least one) backed by `cache`.
    ///
    /// # Panics
    ///
    /// Requires a tokio runtime context.
    pub fn new(config: SchedulerConfig, cache: Arc<TtlCache<T>>) -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(JobQueue::new()),
            notify: Notify::new(),
            cache,
            active: AtomicUsize::new(0),
        });
        let workers = (0..config.max_concurrent.max(1))
            .map(|worker| tokio::spawn(worker_loop(Arc::clone(&shared), worker)))
            .collect();
        Self {
            shared,
            config,
            workers,
        }
    }

    /// Enqueue `operation` under `id` without waiting for it.
    ///
    /// With `use_cache` set and a live cached result for `id`, the returned
    /// [`Scheduled`] is already complete and `operation` is never called.
    /// Otherwise the job is queued before this returns, so submission order
    /// is the tie-break order among equal priorities.
    pub fn submit<F, Fut>(
        &self,
        id: impl Into<String>,
        operation: F,
        options: ScheduleOptions,
    ) -> Scheduled<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let id = id.into();

        if options.use_cache {
            if let Some(hit) = self.shared.cache.get(&id) {
                debug!(id = %id, "served from cache");
                return Scheduled::cached(hit);
            }
        }

        let (reply, rx) = oneshot::channel();
        {
            let mut queue = self.shared.lock_queue();
            if queue.is_closed() {
                return Scheduled::failed(MizanError::SchedulerClosed);
            }
            let seq = queue.next_seq();
            let priority = options.priority.unwrap_or(self.config.default_priority);
            debug!(id = %id, priority, seq, "operation queued");
            queue.push(Job {
                id,
                priority,
                seq,
                use_cache: options.use_cache,
                cache_ttl: options.cache_ttl.unwrap_or(self.config.cache_ttl),
                timeout: options.timeout,
                operation: Box::new(move || operation().boxed()),
                reply,
            });
            metrics::gauge!(telemetry::QUEUE_DEPTH).set(queue.len() as f64);
        }
        self.shared.notify.notify_one();

        Scheduled::waiting(rx)
    }

    /// Run `operation` under `id` and wait for its result.
    ///
    /// Rejects only with the error of this particular operation (or
    /// [`MizanError::SchedulerClosed`]).
    pub async fn schedule<F, Fut>(
        &self,
        id: impl Into<String>,
        operation: F,
        options: ScheduleOptions,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.submit(id, operation, options).await
    }

    /// Current queue depth and number of executing operations.
    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            queued: self.shared.lock_queue().len(),
            active: self.shared.active.load(Ordering::SeqCst),
            max_concurrent: self.workers.len(),
        }
    }

    /// The result cache in front of the queue.
    pub fn cache(&self) -> &Arc<TtlCache<T>> {
        &self.shared.cache
    }

    /// Stop accepting work. Queued operations still run.
    pub fn close(&self) {
        self.shared.lock_queue().close();
        self.shared.notify.notify_waiters();
    }
}

impl<T> Drop for RequestScheduler<T> {
    fn drop(&mut self) {
        self.shared
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .close();
        self.shared.notify.notify_waiters();
    }
}

enum ScheduledState<T> {
    Done(Option<Result<T>>),
    Waiting(oneshot::Receiver<Result<T>>),
}

/// Handle to a submitted operation; resolves to its result.
///
/// Returned by [`RequestScheduler::submit`]. Dropping it does not cancel the
/// operation.
pub struct Scheduled<T> {
    state: ScheduledState<T>,
    from_cache: bool,
}

impl<T> Scheduled<T> {
    fn cached(value: T) -> Self {
        Self {
            state: ScheduledState::Done(Some(Ok(value))),
            from_cache: true,
        }
    }

    fn failed(err: MizanError) -> Self {
        Self {
            state: ScheduledState::Done(Some(Err(err))),
            from_cache: false,
        }
    }

    fn waiting(rx: oneshot::Receiver<Result<T>>) -> Self {
        Self {
            state: ScheduledState::Waiting(rx),
            from_cache: false,
        }
    }

    /// Whether the result came straight from the cache without queueing.
    pub fn is_cached(&self) -> bool {
        self.from_cache
    }
}

// The result is moved out, never pinned.
impl<T> Unpin for Scheduled<T> {}

impl<T> Future for Scheduled<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.state {
            ScheduledState::Done(slot) => {
                Poll::Ready(slot.take().unwrap_or(Err(MizanError::SchedulerClosed)))
            }
            // A dropped sender means the job was discarded unrun (runtime
            // shutting down).
            ScheduledState::Waiting(rx) => Pin::new(rx)
                .poll(cx)
                .map(|received| received.unwrap_or(Err(MizanError::SchedulerClosed))),
        }
    }
}
