//! Asynchronous decode entry point over the task scheduler.
//!
//! Decode requests are submitted to a worker pool by default;
//! with offloading disabled, the identical pipeline runs
//! synchronously on the calling thread and the returned handle
//! resolves immediately.

use tracing::debug;

use pixelpipe_codecs::{decode_image_frame, DecodeConfig, DecodeError, ImageFrame};
use pixelpipe_scheduler::{
    SchedulerConfig, SchedulerStatistics, TaskHandle, TaskId, TaskRunner, TaskScheduler,
};

/// One frame decode request: the frame descriptor,
/// the transfer syntax it is encoded with, and the encoded bytes.
///
/// The pixel data buffer is owned by the job
/// and moves into the worker with it.
pub struct DecodeJob {
    pub frame: ImageFrame,
    pub transfer_syntax_uid: String,
    pub pixel_data: Vec<u8>,
}

/// Task runner executing the decode pipeline on worker threads.
pub struct DecodeRunner {
    config: DecodeConfig,
}

impl DecodeRunner {
    pub fn new(config: DecodeConfig) -> Self {
        DecodeRunner { config }
    }
}

impl TaskRunner for DecodeRunner {
    type Payload = DecodeJob;
    type Output = ImageFrame;
    type Error = DecodeError;

    fn initialize(&self, worker_index: usize) -> Result<(), DecodeError> {
        debug!("decode worker {} initialized", worker_index);
        Ok(())
    }

    fn run(&self, job: DecodeJob) -> Result<ImageFrame, DecodeError> {
        let mut frame = decode_image_frame(
            job.frame,
            &job.transfer_syntax_uid,
            &job.pixel_data,
            &self.config,
        )?;
        frame.unpack_bits();
        Ok(frame)
    }
}

/// Handle to an in-flight or completed decode request.
pub type DecodeHandle = TaskHandle<ImageFrame, DecodeError>;

/// The image decoder service:
/// dispatches frame decode requests across the worker pool.
pub struct ImageDecoder {
    scheduler: TaskScheduler<DecodeRunner>,
}

impl ImageDecoder {
    pub fn new(decode_config: DecodeConfig, scheduler_config: SchedulerConfig) -> Self {
        ImageDecoder {
            scheduler: TaskScheduler::new(DecodeRunner::new(decode_config), scheduler_config),
        }
    }

    /// Submit a frame for decoding with the given priority
    /// (higher numbers are more urgent).
    ///
    /// Await the returned handle for the decoded frame;
    /// its task id can cancel or reprioritize the request
    /// while it is still queued.
    pub fn decode_image_frame(
        &self,
        frame: ImageFrame,
        transfer_syntax_uid: &str,
        pixel_data: Vec<u8>,
        priority: i32,
    ) -> DecodeHandle {
        self.scheduler.submit(
            DecodeJob {
                frame,
                transfer_syntax_uid: transfer_syntax_uid.to_string(),
                pixel_data,
            },
            priority,
        )
    }

    /// Cancel a still-queued decode request.
    pub fn cancel(&self, task_id: TaskId, reason: impl Into<String>) -> bool {
        self.scheduler.cancel_task(task_id, reason)
    }

    /// Change the priority of a still-queued decode request.
    pub fn set_priority(&self, task_id: TaskId, priority: i32) -> bool {
        self.scheduler.set_task_priority(task_id, priority)
    }

    /// Aggregate scheduler statistics.
    pub fn statistics(&self) -> SchedulerStatistics {
        self.scheduler.statistics()
    }

    /// Tear down the worker pool,
    /// rejecting still-queued decode requests.
    pub fn shutdown(&mut self) {
        self.scheduler.shutdown()
    }
}
