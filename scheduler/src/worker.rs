//! Worker execution contexts and the request/response protocol.
//!
//! Each worker is an OS thread with its own request channel.
//! Workers share no state with the scheduler:
//! task payloads move into the worker at dispatch time
//! and results move back through a shared reply channel.

use std::io;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use tracing::warn;

use crate::task::TaskId;
use crate::TaskRunner;

/// The lifecycle state of a worker execution context.
///
/// A spawned worker is not eligible for dispatch
/// until it acknowledges its own initialization.
#[derive(Debug, Copy, Clone, Eq, Hash, PartialEq)]
pub enum WorkerStatus {
    Initializing,
    Ready,
    Busy,
}

/// A request sent from the scheduler to a worker.
pub(crate) enum WorkerRequest<P> {
    /// Load an additional named capability into the worker.
    LoadCapability { name: String },
    /// Run a task to completion.
    Task { task_id: TaskId, payload: P },
    Shutdown,
}

/// A response sent from a worker back to the scheduler.
///
/// Replies carry the worker index for bookkeeping,
/// but completions are correlated by task id
/// so a stale response cannot be misattributed.
pub(crate) enum WorkerReply<T, E> {
    Initialized {
        worker_index: usize,
    },
    InitializeFailed {
        worker_index: usize,
        message: String,
    },
    Completed {
        task_id: TaskId,
        worker_index: usize,
        result: Result<T, E>,
    },
}

/// Scheduler-side bookkeeping for one worker.
pub(crate) struct WorkerHandle<P> {
    pub status: WorkerStatus,
    pub current_task: Option<TaskId>,
    pub sender: mpsc::Sender<WorkerRequest<P>>,
    pub join: Option<thread::JoinHandle<()>>,
}

/// Spawn a new worker thread.
pub(crate) fn spawn<R: TaskRunner>(
    runner: Arc<R>,
    worker_index: usize,
    capabilities: Vec<String>,
    reply_tx: mpsc::Sender<WorkerReply<R::Output, R::Error>>,
) -> io::Result<WorkerHandle<R::Payload>> {
    let (sender, receiver) = mpsc::channel();
    let join = thread::Builder::new()
        .name(format!("pixelpipe-worker-{worker_index}"))
        .spawn(move || worker_loop(runner, worker_index, capabilities, receiver, reply_tx))?;

    Ok(WorkerHandle {
        status: WorkerStatus::Initializing,
        current_task: None,
        sender,
        join: Some(join),
    })
}

fn worker_loop<R: TaskRunner>(
    runner: Arc<R>,
    worker_index: usize,
    capabilities: Vec<String>,
    receiver: mpsc::Receiver<WorkerRequest<R::Payload>>,
    reply_tx: mpsc::Sender<WorkerReply<R::Output, R::Error>>,
) {
    if let Err(e) = runner.initialize(worker_index) {
        let _ = reply_tx.send(WorkerReply::InitializeFailed {
            worker_index,
            message: e.to_string(),
        });
        return;
    }

    // capabilities registered before this worker was spawned
    for name in &capabilities {
        if let Err(e) = runner.load_capability(name) {
            warn!("worker {} failed to load capability `{}`: {}", worker_index, name, e);
        }
    }

    if reply_tx.send(WorkerReply::Initialized { worker_index }).is_err() {
        return;
    }

    while let Ok(request) = receiver.recv() {
        match request {
            WorkerRequest::LoadCapability { name } => {
                if let Err(e) = runner.load_capability(&name) {
                    warn!("worker {} failed to load capability `{}`: {}", worker_index, name, e);
                }
            }
            WorkerRequest::Task { task_id, payload } => {
                let result = runner.run(payload);
                if reply_tx
                    .send(WorkerReply::Completed {
                        task_id,
                        worker_index,
                        result,
                    })
                    .is_err()
                {
                    break;
                }
            }
            WorkerRequest::Shutdown => break,
        }
    }
}
