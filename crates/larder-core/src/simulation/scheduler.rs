//! Background worker that drives simulation jobs to completion.
//!
//! Jobs travel to a single named worker thread over a bounded
//! `sync_channel`; each job answers on its own reply channel. Cancellation
//! is cooperative and observed once per cycle:
//! - `JobHandle::cancel` stops one job
//! - `cancel_all` stops every job submitted before the call
//! - `shutdown` stops the worker after cancelling what is left

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender, TryRecvError, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use super::{CycleStatus, SimulationJob, SimulationReport};
use crate::error::SimulationError;

pub type JobId = u64;
pub type JobResult = Result<SimulationReport, SimulationError>;

/// Periodic progress of a running job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationProgress {
    pub job: JobId,
    pub cycle: u32,
    pub max_cycles: u32,
}

type ProgressFn = Box<dyn FnMut(SimulationProgress) + Send>;
type CompleteFn = Box<dyn FnOnce(JobId, &JobResult) + Send>;

/// Callbacks invoked on the worker thread. Callbacks of all jobs are
/// serialized with each other.
#[derive(Default)]
pub struct JobCallbacks {
    on_progress: Option<ProgressFn>,
    on_complete: Option<CompleteFn>,
}

impl JobCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_progress(mut self, f: impl FnMut(SimulationProgress) + Send + 'static) -> Self {
        self.on_progress = Some(Box::new(f));
        self
    }

    pub fn on_complete(mut self, f: impl FnOnce(JobId, &JobResult) + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }
}

struct QueuedJob {
    id: JobId,
    generation: u64,
    job: SimulationJob,
    cancel: Arc<AtomicBool>,
    callbacks: JobCallbacks,
    reply: Sender<JobResult>,
}

struct Shared {
    running: AtomicBool,
    generation: AtomicU64,
    callback_lock: Mutex<()>,
}

impl Shared {
    fn callbacks(&self) -> MutexGuard<'_, ()> {
        self.callback_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// The caller's side of a submitted job.
pub struct JobHandle {
    id: JobId,
    cancel: Arc<AtomicBool>,
    result_rx: Receiver<JobResult>,
    received: Option<JobResult>,
}

impl JobHandle {
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Ask the worker to stop this job at its next cycle.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Block until the job completes.
    pub fn wait(mut self) -> JobResult {
        if let Some(result) = self.received.take() {
            return result;
        }
        self.result_rx
            .recv()
            .unwrap_or(Err(SimulationError::SchedulerClosed))
    }

    /// The result if the job has completed, without blocking.
    pub fn try_result(&mut self) -> Option<JobResult> {
        if self.received.is_none() {
            match self.result_rx.try_recv() {
                Ok(result) => self.received = Some(result),
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => {
                    self.received = Some(Err(SimulationError::SchedulerClosed))
                }
            }
        }
        self.received.clone()
    }
}

pub struct SimulationScheduler {
    sender: Option<SyncSender<QueuedJob>>,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
    next_id: AtomicU64,
}

impl SimulationScheduler {
    /// Start the worker. `capacity` bounds the queue; `progress_interval`
    /// is the number of cycles between progress callbacks (0 disables them).
    pub fn spawn(capacity: usize, progress_interval: u32) -> io::Result<Self> {
        let (sender, receiver) = mpsc::sync_channel::<QueuedJob>(capacity);
        let shared = Arc::new(Shared {
            running: AtomicBool::new(true),
            generation: AtomicU64::new(0),
            callback_lock: Mutex::new(()),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("larder-sim".to_string())
            .spawn(move || worker_main(receiver, worker_shared, progress_interval))?;

        Ok(Self {
            sender: Some(sender),
            shared,
            worker: Some(worker),
            next_id: AtomicU64::new(1),
        })
    }

    fn package(&self, job: SimulationJob, callbacks: JobCallbacks) -> (QueuedJob, JobHandle) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let cancel = Arc::new(AtomicBool::new(false));
        let (reply, result_rx) = mpsc::channel();
        let queued = QueuedJob {
            id,
            generation: self.shared.generation.load(Ordering::SeqCst),
            job,
            cancel: Arc::clone(&cancel),
            callbacks,
            reply,
        };
        let handle = JobHandle {
            id,
            cancel,
            result_rx,
            received: None,
        };
        (queued, handle)
    }

    /// Queue a job, blocking while the queue is full.
    pub fn submit(
        &self,
        job: SimulationJob,
        callbacks: JobCallbacks,
    ) -> Result<JobHandle, SimulationError> {
        let sender = self.sender.as_ref().ok_or(SimulationError::SchedulerClosed)?;
        let (queued, handle) = self.package(job, callbacks);
        sender
            .send(queued)
            .map_err(|_| SimulationError::SchedulerClosed)?;
        Ok(handle)
    }

    /// Queue a job, failing with `QueueFull` instead of blocking.
    pub fn try_submit(
        &self,
        job: SimulationJob,
        callbacks: JobCallbacks,
    ) -> Result<JobHandle, SimulationError> {
        let sender = self.sender.as_ref().ok_or(SimulationError::SchedulerClosed)?;
        let (queued, handle) = self.package(job, callbacks);
        match sender.try_send(queued) {
            Ok(()) => Ok(handle),
            Err(TrySendError::Full(_)) => Err(SimulationError::QueueFull),
            Err(TrySendError::Disconnected(_)) => Err(SimulationError::SchedulerClosed),
        }
    }

    /// Cancel the running job and every job queued so far.
    pub fn cancel_all(&self) {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some() && self.shared.running.load(Ordering::SeqCst)
    }

    /// Stop the worker and wait for it. Jobs still queued complete as
    /// cancelled.
    pub fn shutdown(&mut self) {
        self.shared.running.store(false, Ordering::SeqCst);
        self.sender = None;
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::warn!("simulation worker exited by panic");
            }
        }
    }
}

impl Drop for SimulationScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_main(receiver: Receiver<QueuedJob>, shared: Arc<Shared>, progress_interval: u32) {
    log::debug!("simulation worker started");
    while let Ok(queued) = receiver.recv() {
        run_job(queued, &shared, progress_interval);
    }
    log::debug!("simulation worker stopped");
}

fn run_job(queued: QueuedJob, shared: &Shared, progress_interval: u32) {
    let QueuedJob {
        id,
        generation,
        mut job,
        cancel,
        mut callbacks,
        reply,
    } = queued;

    let driven = panic::catch_unwind(AssertUnwindSafe(|| {
        drive(
            id,
            generation,
            &mut job,
            &cancel,
            shared,
            &mut callbacks.on_progress,
            progress_interval,
        )
    }));
    let result = match driven {
        Ok(result) => result,
        Err(payload) => Err(record_panic(&mut job, id, payload.as_ref())),
    };

    match &result {
        Ok(report) => log::info!(
            "simulation job {} ('{}') finished: {} cycles{}",
            id,
            job.label,
            report.cycles_run,
            if report.cancelled { ", cancelled" } else { "" }
        ),
        Err(e) => log::info!("simulation job {} ('{}') failed: {}", id, job.label, e),
    }

    if let Some(on_complete) = callbacks.on_complete.take() {
        let _guard = shared.callbacks();
        let called = panic::catch_unwind(AssertUnwindSafe(|| on_complete(id, &result)));
        if called.is_err() {
            log::warn!("completion callback of simulation job {} panicked", id);
        }
    }
    // The caller may have dropped its handle
    let _ = reply.send(result);
}

fn drive(
    id: JobId,
    generation: u64,
    job: &mut SimulationJob,
    cancel: &AtomicBool,
    shared: &Shared,
    on_progress: &mut Option<ProgressFn>,
    progress_interval: u32,
) -> JobResult {
    loop {
        let stop = !shared.running.load(Ordering::SeqCst)
            || cancel.load(Ordering::SeqCst)
            || shared.generation.load(Ordering::SeqCst) != generation;
        if stop {
            job.request_exit();
        }

        match job.run_cycle()? {
            CycleStatus::Finished => break,
            CycleStatus::Continue => {
                let cycle = job.current_cycle();
                if progress_interval > 0 && cycle % progress_interval == 0 {
                    if let Some(report_progress) = on_progress.as_mut() {
                        let _guard = shared.callbacks();
                        report_progress(SimulationProgress {
                            job: id,
                            cycle,
                            max_cycles: job.max_cycles(),
                        });
                    }
                }
            }
        }
    }
    Ok(job.take_report().unwrap_or_default())
}

/// Mark a job that panicked mid-run as failed.
fn record_panic(job: &mut SimulationJob, id: JobId, payload: &(dyn Any + Send)) -> SimulationError {
    let message = panic_message(payload);
    log::warn!("simulation job {} panicked: {}", id, message);
    let error = SimulationError::Panicked(message);
    job.fail(error.clone());
    error
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
