//! Fixed-size worker pool
//!
//! Jobs are queued on an unbounded channel and picked up by a fixed number of
//! named threads. Shutting down closes the queue: jobs already queued still run,
//! new submissions are refused.

use crossbeam_channel::{unbounded, Sender};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use tracing::{debug, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Pool size used for `requested` threads: never more than the CPU count
pub fn effective_pool_size(requested: usize) -> usize {
    let cores = thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    requested.min(cores).max(1)
}

#[derive(Debug)]
pub struct WorkerPool {
    name: String,
    size: usize,
    sender: Mutex<Option<Sender<Job>>>,
}

impl WorkerPool {
    /// Spawn `size` worker threads named after `name`
    pub fn new(name: impl Into<String>, size: usize) -> std::io::Result<Self> {
        let name = name.into();
        let (sender, receiver) = unbounded::<Job>();

        for index in 0..size {
            let receiver = receiver.clone();
            let pool = name.clone();
            thread::Builder::new()
                .name(format!("{}-worker-{}", name, index))
                .spawn(move || {
                    while let Ok(job) = receiver.recv() {
                        // A panicking job must not take the worker down with it
                        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                            warn!(pool = %pool, worker = index, "Job panicked");
                        }
                    }
                    debug!(pool = %pool, worker = index, "Worker exiting");
                })?;
        }

        Ok(Self {
            name,
            size,
            sender: Mutex::new(Some(sender)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Queue a job; returns `false` once the pool has been shut down
    pub fn execute<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        match self.sender.lock().as_ref() {
            Some(sender) => sender.send(Box::new(job)).is_ok(),
            None => false,
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.sender.lock().is_none()
    }

    /// Stop accepting jobs. Idempotent.
    pub fn shutdown(&self) {
        if self.sender.lock().take().is_some() {
            debug!(pool = %self.name, "Worker pool shut down");
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
