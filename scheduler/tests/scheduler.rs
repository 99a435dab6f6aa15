//! Dispatch ordering, mutation and lifecycle tests for the task scheduler.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use pixelpipe_scheduler::{SchedulerConfig, TaskError, TaskRunner, TaskScheduler};

#[derive(Debug)]
struct TestError;

impl fmt::Display for TestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("test failure")
    }
}

impl std::error::Error for TestError {}

enum Job {
    /// hold the worker until the gate opens
    Block,
    /// record the tag and return it
    Tag(i32),
    Fail,
}

/// Records the order in which tasks actually run.
struct RecordingRunner {
    gate: Arc<(Mutex<bool>, Condvar)>,
    log: Arc<Mutex<Vec<i32>>>,
}

impl RecordingRunner {
    fn new() -> (Self, Arc<(Mutex<bool>, Condvar)>, Arc<Mutex<Vec<i32>>>) {
        let gate = Arc::new((Mutex::new(false), Condvar::new()));
        let log = Arc::new(Mutex::new(Vec::new()));
        (
            RecordingRunner {
                gate: gate.clone(),
                log: log.clone(),
            },
            gate,
            log,
        )
    }
}

fn open_gate(gate: &Arc<(Mutex<bool>, Condvar)>) {
    let (lock, cvar) = &**gate;
    *lock.lock().unwrap() = true;
    cvar.notify_all();
}

impl TaskRunner for RecordingRunner {
    type Payload = Job;
    type Output = i32;
    type Error = TestError;

    fn run(&self, payload: Job) -> Result<i32, TestError> {
        match payload {
            Job::Block => {
                let (lock, cvar) = &*self.gate;
                let mut open = lock.lock().unwrap();
                while !*open {
                    open = cvar.wait(open).unwrap();
                }
                Ok(-1)
            }
            Job::Tag(tag) => {
                self.log.lock().unwrap().push(tag);
                Ok(tag)
            }
            Job::Fail => Err(TestError),
        }
    }
}

fn single_worker_config() -> SchedulerConfig {
    SchedulerConfig {
        max_workers: 1,
        spawn_on_demand: true,
        offload: true,
    }
}

#[tokio::test]
async fn tasks_dispatch_in_priority_order() {
    let (runner, gate, log) = RecordingRunner::new();
    let scheduler = TaskScheduler::new(runner, single_worker_config());

    // hold the single worker so the rest of the queue builds up
    let blocker = scheduler.submit(Job::Block, 100);

    let low = scheduler.submit(Job::Tag(1), 1);
    let high = scheduler.submit(Job::Tag(5), 5);
    let mid = scheduler.submit(Job::Tag(3), 3);

    open_gate(&gate);

    assert_eq!(blocker.await.unwrap(), -1);
    assert_eq!(high.await.unwrap(), 5);
    assert_eq!(mid.await.unwrap(), 3);
    assert_eq!(low.await.unwrap(), 1);

    assert_eq!(*log.lock().unwrap(), vec![5, 3, 1]);
}

#[tokio::test]
async fn equal_priorities_dispatch_in_submission_order() {
    let (runner, gate, log) = RecordingRunner::new();
    let scheduler = TaskScheduler::new(runner, single_worker_config());

    let blocker = scheduler.submit(Job::Block, 100);
    let first = scheduler.submit(Job::Tag(10), 0);
    let second = scheduler.submit(Job::Tag(20), 0);
    let third = scheduler.submit(Job::Tag(30), 0);

    open_gate(&gate);

    blocker.await.unwrap();
    first.await.unwrap();
    second.await.unwrap();
    third.await.unwrap();

    assert_eq!(*log.lock().unwrap(), vec![10, 20, 30]);
}

#[tokio::test]
async fn queued_task_can_be_canceled() {
    let (runner, gate, log) = RecordingRunner::new();
    let scheduler = TaskScheduler::new(runner, single_worker_config());

    let blocker = scheduler.submit(Job::Block, 100);
    let doomed = scheduler.submit(Job::Tag(7), 0);
    let kept = scheduler.submit(Job::Tag(8), 0);

    assert!(scheduler.cancel_task(doomed.task_id(), "no longer visible"));
    // unknown ids are not cancelable
    assert!(!scheduler.cancel_task(9999, "nope"));

    open_gate(&gate);

    blocker.await.unwrap();
    match doomed.await {
        Err(TaskError::Canceled { reason }) => assert_eq!(reason, "no longer visible"),
        other => panic!("expected cancellation, got {:?}", other.map(|_| ())),
    }
    kept.await.unwrap();

    assert_eq!(*log.lock().unwrap(), vec![8]);
}

#[tokio::test]
async fn queued_task_can_be_reprioritized() {
    let (runner, gate, log) = RecordingRunner::new();
    let scheduler = TaskScheduler::new(runner, single_worker_config());

    let blocker = scheduler.submit(Job::Block, 100);
    let first = scheduler.submit(Job::Tag(1), 0);
    let second = scheduler.submit(Job::Tag(2), 0);

    assert!(scheduler.set_task_priority(second.task_id(), 10));

    open_gate(&gate);

    blocker.await.unwrap();
    first.await.unwrap();
    second.await.unwrap();

    assert_eq!(*log.lock().unwrap(), vec![2, 1]);
}

#[tokio::test]
async fn runner_failures_propagate_to_the_handle() {
    let (runner, _gate, _log) = RecordingRunner::new();
    let scheduler = TaskScheduler::new(runner, single_worker_config());

    let handle = scheduler.submit(Job::Fail, 0);
    match handle.await {
        Err(TaskError::Runner { .. }) => {}
        other => panic!("expected runner error, got {:?}", other.map(|_| ())),
    }

    // a failed task does not poison the pool
    let ok = scheduler.submit(Job::Tag(1), 0);
    assert_eq!(ok.await.unwrap(), 1);
}

#[tokio::test]
async fn workers_spawn_on_demand_up_to_capacity() {
    let (runner, gate, _log) = RecordingRunner::new();
    let scheduler = TaskScheduler::new(
        runner,
        SchedulerConfig {
            max_workers: 2,
            spawn_on_demand: true,
            offload: true,
        },
    );

    assert_eq!(scheduler.statistics().num_workers, 0);

    let a = scheduler.submit(Job::Block, 0);
    let b = scheduler.submit(Job::Block, 0);
    let c = scheduler.submit(Job::Block, 0);

    // spawning stops at the configured capacity
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(scheduler.statistics().num_workers, 2);

    open_gate(&gate);
    a.await.unwrap();
    b.await.unwrap();
    c.await.unwrap();

    let stats = scheduler.statistics();
    assert_eq!(stats.tasks_completed, 3);
    assert_eq!(stats.tasks_queued, 0);
    assert_eq!(stats.tasks_executing, 0);
}

#[tokio::test]
async fn fallback_mode_runs_inline() {
    let (runner, _gate, log) = RecordingRunner::new();
    let scheduler = TaskScheduler::new(
        runner,
        SchedulerConfig {
            max_workers: 4,
            spawn_on_demand: true,
            offload: false,
        },
    );

    let handle = scheduler.submit(Job::Tag(42), 0);
    // the handle is already resolved; no workers were involved
    assert_eq!(scheduler.statistics().num_workers, 0);
    assert_eq!(handle.await.unwrap(), 42);
    assert_eq!(*log.lock().unwrap(), vec![42]);
}

#[tokio::test]
async fn shutdown_rejects_queued_tasks() {
    let (runner, gate, _log) = RecordingRunner::new();
    let mut scheduler = TaskScheduler::new(runner, single_worker_config());

    let running = scheduler.submit(Job::Block, 100);
    let queued = scheduler.submit(Job::Tag(1), 0);

    // give the worker time to pick up the blocker
    tokio::time::sleep(Duration::from_millis(50)).await;

    // release the blocked worker once shutdown is underway
    let opener = {
        let gate = gate.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            open_gate(&gate);
        })
    };
    scheduler.shutdown();
    opener.join().unwrap();

    // the dispatched task ran to completion, the queued one was rejected
    assert_eq!(running.await.unwrap(), -1);
    match queued.await {
        Err(TaskError::ShutDown) => {}
        other => panic!("expected shutdown rejection, got {:?}", other.map(|_| ())),
    }
}
