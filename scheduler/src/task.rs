//! Task identifiers, result handles and task-level errors.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use snafu::Snafu;
use tokio::sync::oneshot;

/// Monotonically increasing task identifier,
/// unique within one scheduler instance.
pub type TaskId = u64;

/// Why a submitted task did not produce a result.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum TaskError<E: std::error::Error + 'static> {
    /// The task was canceled while still queued.
    #[snafu(display("task canceled: {reason}"))]
    Canceled { reason: String },

    /// The scheduler was shut down before the task could run.
    #[snafu(display("scheduler was shut down"))]
    ShutDown,

    /// The task runner reported a failure.
    #[snafu(display("{source}"))]
    Runner { source: E },
}

/// A handle to a submitted task.
///
/// Awaiting the handle yields the task's result.
/// The task id can be used to cancel or reprioritize the task
/// while it is still queued.
#[derive(Debug)]
pub struct TaskHandle<T, E: std::error::Error + 'static> {
    pub(crate) task_id: TaskId,
    pub(crate) receiver: oneshot::Receiver<Result<T, TaskError<E>>>,
}

impl<T, E: std::error::Error + 'static> TaskHandle<T, E> {
    /// The identifier assigned to this task.
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }
}

impl<T, E: std::error::Error + 'static> Future for TaskHandle<T, E> {
    type Output = Result<T, TaskError<E>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        Pin::new(&mut this.receiver)
            .poll(cx)
            .map(|received| match received {
                Ok(result) => result,
                // the responder was dropped without a result
                Err(_) => Err(TaskError::ShutDown),
            })
    }
}

/// A task waiting in the scheduler queue.
pub(crate) struct QueuedTask<P, T, E: std::error::Error + 'static> {
    pub id: TaskId,
    pub priority: i32,
    pub payload: P,
    pub enqueued_at: Instant,
    pub responder: oneshot::Sender<Result<T, TaskError<E>>>,
}
