//! Priority task scheduler and worker pool
//! for off-thread pixel data decoding.
//!
//! [`TaskScheduler`] keeps a priority-ordered queue of submitted tasks
//! and a pool of isolated worker threads.
//! Workers are spawned lazily up to the configured capacity,
//! the queue dispatches strictly by descending priority
//! (submission order within equal priorities),
//! and a completed task immediately re-triggers dispatch
//! so the pool stays saturated without external polling.
//!
//! Tasks that are still queued may be canceled or reprioritized;
//! once a task is handed to a worker there is no cancellation channel.
//! The queue is unbounded and dispatched tasks have no timeout:
//! this scheduler assumes a trusted, interactively-bounded workload.
//!
//! # Example
//! ```no_run
//! use pixelpipe_scheduler::{SchedulerConfig, TaskRunner, TaskScheduler};
//!
//! struct Doubler;
//!
//! impl TaskRunner for Doubler {
//!     type Payload = u32;
//!     type Output = u32;
//!     type Error = std::convert::Infallible;
//!
//!     fn run(&self, payload: u32) -> Result<u32, Self::Error> {
//!         Ok(payload * 2)
//!     }
//! }
//!
//! # async fn example() {
//! let scheduler = TaskScheduler::new(Doubler, SchedulerConfig::default());
//! let handle = scheduler.submit(21, 0);
//! assert_eq!(handle.await.unwrap(), 42);
//! # }
//! ```

mod task;
mod worker;

pub use task::{TaskError, TaskHandle, TaskId};
pub use worker::WorkerStatus;

use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use tracing::{debug, error, warn};

use task::QueuedTask;
use worker::{WorkerHandle, WorkerReply, WorkerRequest};

/// The work executed by the pool's workers.
///
/// The runner is shared by every worker,
/// so implementations hold only immutable configuration
/// or internally synchronized state.
pub trait TaskRunner: Send + Sync + 'static {
    type Payload: Send + 'static;
    type Output: Send + 'static;
    type Error: std::error::Error + Send + 'static;

    /// Called once per worker before it becomes eligible for dispatch.
    ///
    /// In fallback (non-offloaded) mode this is called lazily,
    /// once, on first use.
    fn initialize(&self, _worker_index: usize) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Load an additional named capability,
    /// previously registered through
    /// [`TaskScheduler::load_capability`].
    fn load_capability(&self, _name: &str) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Run one task to completion.
    fn run(&self, payload: Self::Payload) -> Result<Self::Output, Self::Error>;
}

/// Pool and dispatch configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Upper bound on the number of worker threads.
    pub max_workers: usize,
    /// Spawn workers on demand as tasks arrive,
    /// instead of eagerly at construction.
    pub spawn_on_demand: bool,
    /// When disabled, submitted tasks run synchronously
    /// on the calling thread and no workers are spawned.
    pub offload: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            max_workers: thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            spawn_on_demand: true,
            offload: true,
        }
    }
}

/// Aggregate scheduler statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerStatistics {
    pub max_workers: usize,
    pub num_workers: usize,
    pub tasks_queued: usize,
    pub tasks_executing: usize,
    pub tasks_completed: u64,
    /// cumulative time workers spent running tasks
    pub total_task_time: Duration,
    /// cumulative time completed tasks spent waiting in the queue
    pub total_queue_wait_time: Duration,
}

struct DispatchedTask<T, E: std::error::Error + 'static> {
    responder: oneshot::Sender<Result<T, TaskError<E>>>,
    worker_index: usize,
    started_at: Instant,
}

struct State<R: TaskRunner> {
    queue: Vec<QueuedTask<R::Payload, R::Output, R::Error>>,
    workers: Vec<WorkerHandle<R::Payload>>,
    dispatched: HashMap<TaskId, DispatchedTask<R::Output, R::Error>>,
    reply_tx: Option<mpsc::Sender<WorkerReply<R::Output, R::Error>>>,
    next_task_id: TaskId,
    capabilities: Vec<String>,
    inline_initialized: bool,
    shut_down: bool,
    tasks_completed: u64,
    total_task_time: Duration,
    total_queue_wait_time: Duration,
}

struct Shared<R: TaskRunner> {
    runner: Arc<R>,
    config: SchedulerConfig,
    state: Mutex<State<R>>,
}

impl<R: TaskRunner> Shared<R> {
    fn state(&self) -> MutexGuard<'_, State<R>> {
        self.state.lock().expect("scheduler state lock poisoned")
    }

    /// The scheduling loop, invoked after every enqueue and completion.
    ///
    /// Dispatches queued tasks to ready workers until either runs out;
    /// when no worker is ready and the pool is below capacity,
    /// a new worker is spawned instead.
    fn pump(&self, state: &mut State<R>) {
        loop {
            if state.shut_down || state.queue.is_empty() {
                return;
            }

            let Some(index) = state
                .workers
                .iter()
                .position(|w| w.status == WorkerStatus::Ready)
            else {
                if state.workers.len() < self.config.max_workers {
                    self.spawn_worker(state);
                }
                return;
            };

            let QueuedTask {
                id,
                payload,
                enqueued_at,
                responder,
                ..
            } = state.queue.remove(0);

            state.total_queue_wait_time += enqueued_at.elapsed();
            state.dispatched.insert(
                id,
                DispatchedTask {
                    responder,
                    worker_index: index,
                    started_at: Instant::now(),
                },
            );

            let send_result = {
                let worker = &mut state.workers[index];
                worker.status = WorkerStatus::Busy;
                worker.current_task = Some(id);
                worker
                    .sender
                    .send(WorkerRequest::Task { task_id: id, payload })
            };

            if send_result.is_err() {
                // the worker thread is gone; take it out of rotation
                warn!("worker {} is unreachable, failing task {}", index, id);
                state.workers[index].status = WorkerStatus::Initializing;
                state.workers[index].current_task = None;
                if let Some(done) = state.dispatched.remove(&id) {
                    let _ = done.responder.send(Err(TaskError::ShutDown));
                }
            }
        }
    }

    fn spawn_worker(&self, state: &mut State<R>) {
        let Some(reply_tx) = state.reply_tx.clone() else {
            return;
        };
        let worker_index = state.workers.len();
        match worker::spawn(
            self.runner.clone(),
            worker_index,
            state.capabilities.clone(),
            reply_tx,
        ) {
            Ok(handle) => {
                debug!("spawned worker {}", worker_index);
                state.workers.push(handle);
            }
            Err(e) => warn!("failed to spawn worker {}: {}", worker_index, e),
        }
    }

    fn handle_reply(&self, reply: WorkerReply<R::Output, R::Error>) {
        let mut state = self.state();
        match reply {
            WorkerReply::Initialized { worker_index } => {
                if let Some(worker) = state.workers.get_mut(worker_index) {
                    worker.status = WorkerStatus::Ready;
                }
                self.pump(&mut state);
            }
            WorkerReply::InitializeFailed {
                worker_index,
                message,
            } => {
                error!("worker {} failed to initialize: {}", worker_index, message);
            }
            WorkerReply::Completed {
                task_id,
                worker_index,
                result,
            } => {
                let Some(done) = state.dispatched.remove(&task_id) else {
                    warn!(
                        "dropping completion for unknown task {} from worker {}",
                        task_id, worker_index
                    );
                    return;
                };
                if done.worker_index != worker_index {
                    warn!(
                        "task {} was dispatched to worker {} but completed by {}",
                        task_id, done.worker_index, worker_index
                    );
                }

                state.tasks_completed += 1;
                state.total_task_time += done.started_at.elapsed();
                if let Some(worker) = state.workers.get_mut(done.worker_index) {
                    worker.status = WorkerStatus::Ready;
                    worker.current_task = None;
                }

                let _ = done
                    .responder
                    .send(result.map_err(|source| TaskError::Runner { source }));

                self.pump(&mut state);
            }
        }
    }
}

/// A priority task scheduler over a pool of worker threads.
///
/// All queue and pool state is owned by the scheduler instance;
/// [`shutdown`](TaskScheduler::shutdown) (or dropping the scheduler)
/// tears the pool down, rejecting any still-queued tasks.
pub struct TaskScheduler<R: TaskRunner> {
    shared: Arc<Shared<R>>,
    router: Option<thread::JoinHandle<()>>,
}

impl<R: TaskRunner> TaskScheduler<R> {
    /// Create a scheduler with the given runner and configuration.
    pub fn new(runner: R, config: SchedulerConfig) -> Self {
        let (reply_tx, reply_rx) = mpsc::channel();

        let shared = Arc::new(Shared {
            runner: Arc::new(runner),
            config,
            state: Mutex::new(State {
                queue: Vec::new(),
                workers: Vec::new(),
                dispatched: HashMap::new(),
                reply_tx: Some(reply_tx),
                next_task_id: 0,
                capabilities: Vec::new(),
                inline_initialized: false,
                shut_down: false,
                tasks_completed: 0,
                total_task_time: Duration::ZERO,
                total_queue_wait_time: Duration::ZERO,
            }),
        });

        let router = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("pixelpipe-scheduler".into())
                .spawn(move || {
                    while let Ok(reply) = reply_rx.recv() {
                        shared.handle_reply(reply);
                    }
                })
                .expect("failed to spawn scheduler router thread")
        };

        let scheduler = TaskScheduler {
            shared,
            router: Some(router),
        };

        if scheduler.shared.config.offload && !scheduler.shared.config.spawn_on_demand {
            let mut state = scheduler.shared.state();
            while state.workers.len() < scheduler.shared.config.max_workers {
                let before = state.workers.len();
                scheduler.shared.spawn_worker(&mut state);
                if state.workers.len() == before {
                    break;
                }
            }
        }

        scheduler
    }

    /// Submit a task with the given priority
    /// (higher numbers are more urgent).
    ///
    /// The task is inserted in front of the first queued task
    /// with a strictly lower priority,
    /// preserving submission order between equal priorities.
    ///
    /// With offloading disabled, the task runs synchronously
    /// on the calling thread and the returned handle
    /// is already resolved.
    pub fn submit(&self, payload: R::Payload, priority: i32) -> TaskHandle<R::Output, R::Error> {
        let (responder, receiver) = oneshot::channel();

        let mut state = self.shared.state();
        let task_id = state.next_task_id;
        state.next_task_id += 1;
        let handle = TaskHandle { task_id, receiver };

        if state.shut_down {
            let _ = responder.send(Err(TaskError::ShutDown));
            return handle;
        }

        if !self.shared.config.offload {
            if !state.inline_initialized {
                if let Err(source) = self.shared.runner.initialize(0) {
                    let _ = responder.send(Err(TaskError::Runner { source }));
                    return handle;
                }
                state.inline_initialized = true;
            }
            drop(state);

            let result = self
                .shared
                .runner
                .run(payload)
                .map_err(|source| TaskError::Runner { source });
            let _ = responder.send(result);
            return handle;
        }

        let position = state
            .queue
            .iter()
            .position(|t| t.priority < priority)
            .unwrap_or(state.queue.len());
        state.queue.insert(
            position,
            QueuedTask {
                id: task_id,
                priority,
                payload,
                enqueued_at: Instant::now(),
                responder,
            },
        );

        self.shared.pump(&mut state);
        handle
    }

    /// Cancel a queued task,
    /// rejecting its handle with the given reason.
    ///
    /// Returns `false` if the task is unknown
    /// or already dispatched to a worker.
    pub fn cancel_task(&self, task_id: TaskId, reason: impl Into<String>) -> bool {
        let mut state = self.shared.state();
        let Some(position) = state.queue.iter().position(|t| t.id == task_id) else {
            return false;
        };
        let task = state.queue.remove(position);
        let _ = task.responder.send(Err(TaskError::Canceled {
            reason: reason.into(),
        }));
        true
    }

    /// Change the priority of a queued task,
    /// moving it to its new position in the queue.
    ///
    /// Returns `false` if the task is unknown
    /// or already dispatched to a worker.
    pub fn set_task_priority(&self, task_id: TaskId, priority: i32) -> bool {
        let mut state = self.shared.state();
        let Some(position) = state.queue.iter().position(|t| t.id == task_id) else {
            return false;
        };
        let mut task = state.queue.remove(position);
        task.priority = priority;
        let position = state
            .queue
            .iter()
            .position(|t| t.priority < priority)
            .unwrap_or(state.queue.len());
        state.queue.insert(position, task);
        true
    }

    /// Register a named capability,
    /// loading it into every spawned worker
    /// and into workers spawned later.
    pub fn load_capability(&self, name: impl Into<String>) {
        let name = name.into();
        let mut state = self.shared.state();
        state.capabilities.push(name.clone());
        for worker in &state.workers {
            let _ = worker.sender.send(WorkerRequest::LoadCapability {
                name: name.clone(),
            });
        }
    }

    /// A snapshot of the scheduler's aggregate statistics.
    pub fn statistics(&self) -> SchedulerStatistics {
        let state = self.shared.state();
        SchedulerStatistics {
            max_workers: self.shared.config.max_workers,
            num_workers: state.workers.len(),
            tasks_queued: state.queue.len(),
            tasks_executing: state.dispatched.len(),
            tasks_completed: state.tasks_completed,
            total_task_time: state.total_task_time,
            total_queue_wait_time: state.total_queue_wait_time,
        }
    }

    /// Tear down the pool.
    ///
    /// Still-queued tasks are rejected;
    /// tasks already dispatched run to completion
    /// before their workers exit.
    pub fn shutdown(&mut self) {
        let (joins, router) = {
            let mut state = self.shared.state();
            if state.shut_down && self.router.is_none() {
                return;
            }
            state.shut_down = true;
            state.reply_tx = None;

            for task in state.queue.drain(..) {
                let _ = task.responder.send(Err(TaskError::ShutDown));
            }
            for worker in &state.workers {
                let _ = worker.sender.send(WorkerRequest::Shutdown);
            }
            let joins: Vec<_> = state
                .workers
                .iter_mut()
                .filter_map(|w| w.join.take())
                .collect();
            (joins, self.router.take())
        };

        for join in joins {
            let _ = join.join();
        }
        if let Some(router) = router {
            let _ = router.join();
        }
    }
}

impl<R: TaskRunner> Drop for TaskScheduler<R> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
