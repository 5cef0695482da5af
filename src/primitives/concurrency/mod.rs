//! Bounded-concurrency execution over a shared worker pool.
//!
//! [`WorkerPool`] owns a fixed set of worker threads fed through a bounded
//! queue. [`run_with_concurrency`] admits at most `concurrency` tasks from a
//! possibly lazy, possibly huge task collection at a time, retries with a
//! fixed backoff when the pool queue is full, honors a cooperative
//! [`TerminationFlag`] before every submission and every wait, and
//! aggregates every task failure into a single error after the batch
//! settles.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{BasaltError, Result, TaskErrors};
use crate::metrics::{default_metrics, CoreMetrics};

/// Fixed pause between submission retries against a saturated pool.
const SUBMIT_BACKOFF: Duration = Duration::from_millis(10);
/// Submission attempts before a saturated pool becomes a fatal error.
const MAX_SUBMIT_ATTEMPTS: usize = 64;

/// Cooperative cancellation flag polled between units of work.
///
/// Raising the flag never interrupts a running task; it stops new work from
/// starting. Clones share the same flag.
#[derive(Debug, Clone)]
pub struct TerminationFlag {
    stopped: Arc<AtomicBool>,
}

impl TerminationFlag {
    /// Creates a flag in the running state.
    pub fn new() -> Self {
        TerminationFlag {
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Requests cooperative termination.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    /// Whether work may keep going.
    #[inline]
    pub fn running(&self) -> bool {
        !self.stopped.load(Ordering::Acquire)
    }

    /// Errors with [`BasaltError::Terminated`] when the flag was raised.
    pub fn check(&self) -> Result<()> {
        if self.running() {
            Ok(())
        } else {
            Err(BasaltError::Terminated)
        }
    }
}

impl Default for TerminationFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Unit of work accepted by the pool.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size worker pool with a bounded submission queue.
///
/// Queue capacity equals the worker count, so a saturated pool pushes back
/// on submitters instead of queueing unbounded work; the admission layer in
/// [`run_with_concurrency`] turns that pushback into backoff-and-retry.
pub struct WorkerPool {
    sender: Mutex<Option<SyncSender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_count: usize,
}

impl WorkerPool {
    /// Spawns a pool with `threads` workers (at least one).
    pub fn new(threads: usize) -> Self {
        let worker_count = threads.max(1);
        let (sender, receiver) = mpsc::sync_channel::<Job>(worker_count);
        let receiver = Arc::new(Mutex::new(receiver));
        let mut workers = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let receiver = Arc::clone(&receiver);
            workers.push(thread::spawn(move || worker_loop(&receiver)));
        }
        WorkerPool {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            worker_count,
        }
    }

    /// Number of worker threads.
    pub fn workers(&self) -> usize {
        self.worker_count
    }

    /// Hands `job` to the pool without blocking; gives the job back when the
    /// queue is full or the pool was shut down.
    pub fn try_submit(&self, job: Job) -> std::result::Result<(), Job> {
        match self.sender.lock().as_ref() {
            Some(sender) => match sender.try_send(job) {
                Ok(()) => Ok(()),
                Err(TrySendError::Full(job)) | Err(TrySendError::Disconnected(job)) => Err(job),
            },
            None => Err(job),
        }
    }

    /// Whether the pool stopped accepting work.
    pub fn is_shut_down(&self) -> bool {
        self.sender.lock().is_none()
    }

    /// Stops accepting work, lets queued jobs drain, and joins the workers.
    /// Idempotent.
    pub fn shutdown(&self) {
        drop(self.sender.lock().take());
        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            let _ = worker.join();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.worker_count)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

fn worker_loop(receiver: &Mutex<Receiver<Job>>) {
    loop {
        let job = receiver.lock().recv();
        match job {
            Ok(job) => job(),
            Err(_) => break,
        }
    }
}

/// Parameters for [`run_with_concurrency`].
pub struct RunParams<'a, I> {
    /// Maximum number of tasks in flight at once.
    pub concurrency: usize,
    /// Task collection, consumed lazily.
    pub tasks: I,
    /// Pool to run on; `None` forces sequential execution.
    pub pool: Option<&'a WorkerPool>,
    /// Cooperative cancellation flag.
    pub termination: TerminationFlag,
    /// Sink for the completed-task counter.
    pub metrics: Arc<dyn CoreMetrics>,
}

impl<'a, I> RunParams<'a, I> {
    /// Parameters with no pool, a fresh termination flag, and the no-op
    /// metrics sink.
    pub fn new(concurrency: usize, tasks: I) -> Self {
        RunParams {
            concurrency,
            tasks,
            pool: None,
            termination: TerminationFlag::new(),
            metrics: default_metrics(),
        }
    }

    /// Runs the batch on `pool`.
    pub fn pool(mut self, pool: &'a WorkerPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Polls `termination` between units of work.
    pub fn termination(mut self, termination: TerminationFlag) -> Self {
        self.termination = termination;
        self
    }

    /// Reports completed tasks to `metrics`.
    pub fn metrics(mut self, metrics: Arc<dyn CoreMetrics>) -> Self {
        self.metrics = metrics;
        self
    }
}

enum TaskOutcome {
    Finished(std::result::Result<(), BasaltError>),
    Skipped,
    Abandoned,
}

/// Sends its outcome back to the runner even when the task unwinds.
struct Completion {
    tx: mpsc::Sender<TaskOutcome>,
    outcome: Option<TaskOutcome>,
}

impl Drop for Completion {
    fn drop(&mut self) {
        if let Some(outcome) = self.outcome.take() {
            let _ = self.tx.send(outcome);
        }
    }
}

/// Runs a batch of independent tasks with at most `concurrency` in flight.
///
/// Falls back to sequential execution on the calling thread when
/// `concurrency <= 1`, no usable pool was supplied, or the collection holds
/// at most one task. Either way every task failure is collected; the batch
/// reports once, after all in-flight work settles, with `Ok(())`,
/// [`BasaltError::Tasks`], [`BasaltError::Terminated`], or
/// [`BasaltError::ExecutorSaturated`].
pub fn run_with_concurrency<I, T>(params: RunParams<'_, I>) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: FnOnce() -> Result<()> + Send + 'static,
{
    let RunParams {
        concurrency,
        tasks,
        pool,
        termination,
        metrics,
    } = params;
    let usable_pool = pool.filter(|pool| !pool.is_shut_down());
    let mut tasks = tasks.into_iter().peekable();
    let Some(first) = tasks.next() else {
        return Ok(());
    };
    let single = tasks.peek().is_none();
    match usable_pool {
        Some(pool) if concurrency > 1 && !single => run_parallel(
            concurrency,
            first,
            tasks,
            pool,
            &termination,
            metrics.as_ref(),
        ),
        _ => run_sequential(
            std::iter::once(first).chain(tasks),
            &termination,
            metrics.as_ref(),
        ),
    }
}

fn run_sequential<I, T>(
    tasks: I,
    termination: &TerminationFlag,
    metrics: &dyn CoreMetrics,
) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: FnOnce() -> Result<()>,
{
    let mut failures = Vec::new();
    let mut completed = 0u64;
    for task in tasks {
        if !termination.running() {
            metrics.record_tasks(completed);
            return terminated_result(failures);
        }
        if let Err(err) = task() {
            failures.push(err);
        }
        completed += 1;
    }
    metrics.record_tasks(completed);
    finished_result(failures)
}

fn run_parallel<I, T>(
    concurrency: usize,
    first: T,
    mut tasks: I,
    pool: &WorkerPool,
    termination: &TerminationFlag,
    metrics: &dyn CoreMetrics,
) -> Result<()>
where
    I: Iterator<Item = T>,
    T: FnOnce() -> Result<()> + Send + 'static,
{
    let (done_tx, done_rx) = mpsc::channel::<TaskOutcome>();
    let cancelled = Arc::new(AtomicBool::new(false));
    let mut next = Some(first);
    let mut in_flight = 0usize;
    let mut completed = 0u64;
    let mut terminated = false;
    let mut failures: Vec<BasaltError> = Vec::new();

    loop {
        if !terminated && !termination.running() {
            terminated = true;
            cancelled.store(true, Ordering::Release);
            warn!(in_flight, "runner.termination.observed");
        }

        if !terminated {
            while in_flight < concurrency {
                let Some(task) = next.take().or_else(|| tasks.next()) else {
                    break;
                };
                if !termination.running() {
                    terminated = true;
                    cancelled.store(true, Ordering::Release);
                    warn!(in_flight, "runner.termination.observed");
                    break;
                }
                let job = wrap_task(task, done_tx.clone(), Arc::clone(&cancelled));
                if let Err(err) = submit_with_backoff(pool, job) {
                    // Wait out whatever is already running before failing.
                    drain_in_flight(&done_rx, in_flight, &mut completed, &mut failures);
                    metrics.record_tasks(completed);
                    return Err(err);
                }
                in_flight += 1;
            }
        }

        if in_flight == 0 {
            break;
        }

        match done_rx.recv() {
            Ok(outcome) => {
                in_flight -= 1;
                account(outcome, &mut completed, &mut failures);
            }
            Err(_) => break,
        }
    }

    debug!(
        completed,
        failed = failures.len(),
        terminated,
        "runner.batch.settled"
    );
    metrics.record_tasks(completed);
    if terminated {
        terminated_result(failures)
    } else {
        finished_result(failures)
    }
}

fn wrap_task<T>(task: T, tx: mpsc::Sender<TaskOutcome>, cancelled: Arc<AtomicBool>) -> Job
where
    T: FnOnce() -> Result<()> + Send + 'static,
{
    Box::new(move || {
        let mut completion = Completion {
            tx,
            outcome: Some(TaskOutcome::Abandoned),
        };
        if cancelled.load(Ordering::Acquire) {
            completion.outcome = Some(TaskOutcome::Skipped);
            return;
        }
        let result = task();
        completion.outcome = Some(TaskOutcome::Finished(result));
    })
}

fn submit_with_backoff(pool: &WorkerPool, mut job: Job) -> Result<()> {
    for attempt in 1..=MAX_SUBMIT_ATTEMPTS {
        match pool.try_submit(job) {
            Ok(()) => {
                if attempt > 1 {
                    debug!(attempt, "runner.submit.retried");
                }
                return Ok(());
            }
            Err(returned) => {
                job = returned;
                thread::sleep(SUBMIT_BACKOFF);
            }
        }
    }
    warn!(attempts = MAX_SUBMIT_ATTEMPTS, "runner.pool.saturated");
    Err(BasaltError::ExecutorSaturated(MAX_SUBMIT_ATTEMPTS))
}

fn drain_in_flight(
    done_rx: &Receiver<TaskOutcome>,
    mut in_flight: usize,
    completed: &mut u64,
    failures: &mut Vec<BasaltError>,
) {
    while in_flight > 0 {
        match done_rx.recv() {
            Ok(outcome) => {
                in_flight -= 1;
                account(outcome, completed, failures);
            }
            Err(_) => break,
        }
    }
}

fn account(outcome: TaskOutcome, completed: &mut u64, failures: &mut Vec<BasaltError>) {
    match outcome {
        TaskOutcome::Finished(Ok(())) => *completed += 1,
        TaskOutcome::Finished(Err(err)) => {
            *completed += 1;
            failures.push(err);
        }
        TaskOutcome::Abandoned => failures.push(BasaltError::TaskAborted),
        TaskOutcome::Skipped => {}
    }
}

fn terminated_result(failures: Vec<BasaltError>) -> Result<()> {
    if !failures.is_empty() {
        warn!(
            dropped_failures = failures.len(),
            "runner.failures.observed_before_termination"
        );
    }
    Err(BasaltError::Terminated)
}

fn finished_result(failures: Vec<BasaltError>) -> Result<()> {
    if failures.is_empty() {
        Ok(())
    } else {
        Err(TaskErrors(failures).into())
    }
}
