// ── Serialized command queue ──
//
// Every task that touches the charger cloud is admitted here. One worker
// drains the channel, so tasks run in submission order and never overlap.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::FutureExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::error::CoreError;

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

/// FIFO queue with a concurrency limit of one.
///
/// Cheaply cloneable; all clones feed the same worker. A task that fails or
/// panics is contained: its own handle observes the outcome, successors
/// run as usual.
#[derive(Clone)]
pub struct CommandQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    tx: mpsc::UnboundedSender<Job>,
    /// Queued plus in-flight tasks.
    pending: Arc<AtomicUsize>,
    cancel: CancellationToken,
    worker: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl CommandQueue {
    /// Create the queue and spawn its worker. Must be called inside a
    /// Tokio runtime.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let worker = tokio::spawn(worker_task(rx, cancel.clone()));

        Self {
            inner: Arc::new(QueueInner {
                tx,
                pending,
                cancel,
                worker: std::sync::Mutex::new(Some(worker)),
            }),
        }
    }

    /// Number of tasks waiting or running.
    pub fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::SeqCst)
    }

    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Admit a task without waiting for it. The returned handle resolves
    /// once the task has run.
    pub fn submit<F, T>(&self, task: F) -> Result<TaskHandle<T>, CoreError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        if self.is_closed() {
            return Err(CoreError::QueueClosed);
        }

        let (done_tx, done_rx) = oneshot::channel();
        let guard = PendingGuard::acquire(&self.inner.pending);
        let job: Job = Box::pin(async move {
            let out = task.await;
            // Count drops before the caller is woken, so `pending()` is
            // already accurate when `wait()` returns.
            drop(guard);
            // Caller may have dropped the handle; the task still ran.
            let _ = done_tx.send(out);
        });

        // On failure the job is dropped here, releasing its guard.
        self.inner.tx.send(job).map_err(|_| CoreError::QueueClosed)?;

        Ok(TaskHandle { rx: done_rx })
    }

    /// Admit a task and wait for its output.
    pub async fn enqueue<F, T>(&self, task: F) -> Result<T, CoreError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.submit(task)?.wait().await
    }

    /// Stop the worker. Queued tasks are dropped and their handles resolve
    /// to `TaskAborted`; later submissions fail with `QueueClosed`.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let worker = self
            .inner
            .worker
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(handle) = worker {
            let _ = handle.await;
        }
        debug!("command queue stopped");
    }
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CommandQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandQueue")
            .field("pending", &self.pending())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Completion handle for a submitted task.
#[derive(Debug)]
pub struct TaskHandle<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> TaskHandle<T> {
    /// Wait for the task's output. Fails with `TaskAborted` if the task
    /// panicked or the queue shut down before running it.
    pub async fn wait(self) -> Result<T, CoreError> {
        self.rx.await.map_err(|_| CoreError::TaskAborted)
    }
}

/// Holds one slot of the pending count for the lifetime of a job. Released
/// when the job finishes, panics, or is dropped unrun.
struct PendingGuard(Arc<AtomicUsize>);

impl PendingGuard {
    fn acquire(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn worker_task(mut rx: mpsc::UnboundedReceiver<Job>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            job = rx.recv() => {
                let Some(job) = job else { break };
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    outcome = AssertUnwindSafe(job).catch_unwind() => {
                        if outcome.is_err() {
                            error!("queued task panicked");
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn tasks_run_in_submission_order() {
        let queue = CommandQueue::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for (i, delay) in [(1, 30), (2, 10), (3, 0)] {
            let log = Arc::clone(&log);
            handles.push(
                queue
                    .submit(async move {
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                        log.lock().unwrap().push(i);
                    })
                    .unwrap(),
            );
        }
        for h in handles {
            h.wait().await.unwrap();
        }

        assert_eq!(*log.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn tasks_never_overlap() {
        let queue = CommandQueue::new();
        let running = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let running = Arc::clone(&running);
            let max_seen = Arc::clone(&max_seen);
            handles.push(
                queue
                    .submit(async move {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        running.fetch_sub(1, Ordering::SeqCst);
                    })
                    .unwrap(),
            );
        }
        for h in handles {
            h.wait().await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_and_panic_do_not_block_successors() {
        let queue = CommandQueue::new();

        let failing = queue
            .submit(async { Err::<(), _>(CoreError::Rejected { message: "boom".into() }) })
            .unwrap();
        let panicking = queue
            .submit::<_, u8>(async { panic!("task blew up") })
            .unwrap();
        let ok = queue.enqueue(async { 42 }).await.unwrap();

        assert!(failing.wait().await.unwrap().is_err());
        assert!(matches!(panicking.wait().await, Err(CoreError::TaskAborted)));
        assert_eq!(ok, 42);
        assert!(queue.is_idle());
    }

    #[tokio::test]
    async fn pending_counts_queued_and_in_flight() {
        let queue = CommandQueue::new();
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let first = queue
            .submit(async move {
                let _ = release_rx.await;
            })
            .unwrap();
        let second = queue.submit(async {}).unwrap();
        assert_eq!(queue.pending(), 2);

        release_tx.send(()).unwrap();
        first.wait().await.unwrap();
        second.wait().await.unwrap();
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test]
    async fn shutdown_closes_queue() {
        let queue = CommandQueue::new();
        queue.shutdown().await;

        assert!(queue.is_closed());
        assert!(matches!(queue.submit(async {}), Err(CoreError::QueueClosed)));
    }
}
