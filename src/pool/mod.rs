//! Worker pool boundary
//!
//! Elements only need two things from a pool: a way to run jobs and a way to
//! map the calling thread back to a worker slot. [`WorkerPool`] is a plain
//! fixed-size implementation used by the runner and the tests.

use crate::core::config::PoolConfig;
use crate::core::errors::{ElementError, Result};
use crossbeam::channel::{unbounded, Sender};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::{self, JoinHandle, ThreadId};
use tracing::{debug, error, info};

pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Scheduling surface an element is bound to
pub trait ThreadPool: Send + Sync {
    /// Resolve a thread-id hash to a worker slot, `None` for foreign threads
    fn thread_index(&self, thread_hash: u64) -> Option<usize>;

    /// Queue a job for execution on some worker
    fn execute(&self, job: Job) -> Result<()>;

    /// Number of workers
    fn size(&self) -> usize;
}

pub fn thread_hash(id: ThreadId) -> u64 {
    let mut hasher = DefaultHasher::new();
    id.hash(&mut hasher);
    hasher.finish()
}

/// Hash of the calling thread's id
pub fn current_thread_hash() -> u64 {
    thread_hash(thread::current().id())
}

/// Fixed number of OS threads draining a shared job channel
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    slots: HashMap<u64, usize>,
}

impl WorkerPool {
    pub fn new(config: &PoolConfig) -> Result<Self> {
        config.validate()?;

        let (sender, receiver) = unbounded::<Job>();
        let mut workers = Vec::with_capacity(config.worker_count);
        let mut slots = HashMap::with_capacity(config.worker_count);

        for index in 0..config.worker_count {
            let receiver = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("{}-{}", config.thread_name, index))
                .spawn(move || {
                    while let Ok(job) = receiver.recv() {
                        if catch_unwind(AssertUnwindSafe(job)).is_err() {
                            error!("Worker {} recovered from a panicking job", index);
                        }
                    }
                    debug!("Worker {} exiting", index);
                })
                .map_err(|e| {
                    ElementError::internal(format!("failed to spawn worker {}: {}", index, e))
                })?;

            slots.insert(thread_hash(handle.thread().id()), index);
            workers.push(handle);
        }

        info!("Started worker pool with {} threads", config.worker_count);
        Ok(Self {
            sender: Some(sender),
            workers,
            slots,
        })
    }
}

impl ThreadPool for WorkerPool {
    fn thread_index(&self, thread_hash: u64) -> Option<usize> {
        self.slots.get(&thread_hash).copied()
    }

    fn execute(&self, job: Job) -> Result<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| ElementError::internal("worker pool is shut down"))?;
        sender
            .send(job)
            .map_err(|_| ElementError::internal("worker pool channel closed"))
    }

    fn size(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the channel lets every worker fall out of its recv loop
        self.sender.take();
        let current = thread::current().id();
        for worker in self.workers.drain(..) {
            if worker.thread().id() == current {
                // Dropped from inside one of our own jobs; that worker exits on its own
                continue;
            }
            if worker.join().is_err() {
                error!("Worker thread panicked during shutdown");
            }
        }
    }
}
