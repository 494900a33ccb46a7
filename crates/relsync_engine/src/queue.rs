//! Serial dispatch queues.
//!
//! All sync work runs as jobs on one [`DispatchQueue`]. A queue runs jobs one
//! at a time in submission order; jobs dispatched from inside a running job
//! run after it, never nested inside it.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, oneshot};

/// A unit of sync work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs jobs serially, in submission order.
pub trait DispatchQueue: Send + Sync {
    /// Submits a job.
    fn dispatch(&self, job: Job);
}

/// A queue that runs jobs on the dispatching thread.
///
/// The first dispatcher drains the queue. Jobs submitted while it drains,
/// from the running job or from other threads, are picked up by the same
/// drain loop, so `dispatch` returns only once the queue is empty or another
/// thread is draining it.
#[derive(Default)]
pub struct SerialQueue {
    jobs: Mutex<VecDeque<Job>>,
    draining: AtomicBool,
}

impl SerialQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of jobs waiting to run.
    pub fn pending(&self) -> usize {
        self.jobs.lock().len()
    }
}

struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl DispatchQueue for SerialQueue {
    fn dispatch(&self, job: Job) {
        self.jobs.lock().push_back(job);

        loop {
            if self.draining.swap(true, Ordering::AcqRel) {
                return;
            }
            {
                let _guard = DrainGuard(&self.draining);
                loop {
                    // The lock must be released before the job runs.
                    let next = self.jobs.lock().pop_front();
                    match next {
                        Some(job) => job(),
                        None => break,
                    }
                }
            }
            // A job may have been queued between the last pop and the release.
            if self.jobs.lock().is_empty() {
                return;
            }
        }
    }
}

/// A queue drained by a task on a tokio runtime.
pub struct TokioQueue {
    sender: mpsc::UnboundedSender<Job>,
}

impl TokioQueue {
    /// Creates a queue whose jobs run on the given runtime.
    pub fn new(handle: &tokio::runtime::Handle) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();
        handle.spawn(async move {
            while let Some(job) = receiver.recv().await {
                job();
            }
            tracing::debug!("dispatch queue closed");
        });
        Self { sender }
    }

    /// Creates a queue on the current runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn current() -> Self {
        Self::new(&tokio::runtime::Handle::current())
    }

    /// Resolves once every job dispatched before this call has run.
    pub fn flush(&self) -> impl Future<Output = ()> + Send + 'static {
        let (done, wait) = oneshot::channel();
        self.dispatch(Box::new(move || {
            let _ = done.send(());
        }));
        async move {
            let _ = wait.await;
        }
    }
}

impl DispatchQueue for TokioQueue {
    fn dispatch(&self, job: Job) {
        if self.sender.send(job).is_err() {
            tracing::warn!("dispatch queue closed, dropping job");
        }
    }
}
