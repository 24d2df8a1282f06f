// src/serial/queue.rs
use futures::future::BoxFuture;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Mutex;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

type Job = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum TaskError {
    #[error("Task panicked: {0}")]
    Panicked(String),

    #[error("Task serializer worker is gone")]
    WorkerGone,
}

/// Runs submitted tasks one at a time, in submission order.
///
/// A single worker drains a FIFO queue and fully settles each task (including
/// capturing a panic) before dequeuing the next one. Every submitter gets its
/// own outcome through the returned [`TaskHandle`]; a failing task never
/// affects the handles of other tasks.
///
/// The worker is spawned on the runtime of the first `submit`, so submission
/// must happen inside a tokio runtime. If that runtime shuts down, tasks still
/// queued on it resolve to [`TaskError::WorkerGone`] and the next `submit`
/// starts a fresh worker on the caller's runtime.
///
/// A task may submit further tasks to the same serializer, but must not
/// await their handles: they only start once the current task has settled.
pub struct TaskSerializer {
    tx: Mutex<Option<mpsc::UnboundedSender<Job>>>,
}

impl TaskSerializer {
    pub fn new() -> Self {
        Self {
            tx: Mutex::new(None),
        }
    }

    /// Enqueue `task`. The task is queued immediately, whether or not the
    /// handle is ever polled, and dropping the handle does not cancel it.
    pub fn submit<F, Fut, T>(&self, task: F) -> TaskHandle<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        let job: Job = Box::new(move || {
            async move {
                let outcome = match std::panic::catch_unwind(AssertUnwindSafe(task)) {
                    Ok(fut) => AssertUnwindSafe(fut)
                        .catch_unwind()
                        .await
                        .map_err(panic_message),
                    Err(payload) => Err(panic_message(payload)),
                };
                // The submitter may have dropped its handle.
                let _ = done_tx.send(outcome.map_err(TaskError::Panicked));
            }
            .boxed()
        });

        self.enqueue(job);
        TaskHandle { rx: done_rx }
    }

    fn enqueue(&self, job: Job) {
        // Sending under the lock keeps submission order across threads.
        let mut slot = self.tx.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let job = match slot.as_ref() {
            Some(tx) => match tx.send(job) {
                Ok(()) => return,
                Err(mpsc::error::SendError(job)) => {
                    debug!("task serializer worker stopped, starting a new one");
                    job
                }
            },
            None => job,
        };

        let tx = spawn_worker();
        if tx.send(job).is_err() {
            debug!("task submitted while the runtime is shutting down");
        }
        *slot = Some(tx);
    }
}

fn spawn_worker() -> mpsc::UnboundedSender<Job> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
    tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            job().await;
        }
        debug!("task serializer drained, worker exiting");
    });
    tx
}

impl Default for TaskSerializer {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of one submitted task.
#[must_use = "a task handle does nothing unless awaited"]
pub struct TaskHandle<T> {
    rx: oneshot::Receiver<Result<T, TaskError>>,
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T, TaskError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(TaskError::WorkerGone)))
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
