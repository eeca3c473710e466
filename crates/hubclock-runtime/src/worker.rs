//! Single-queue worker thread.
//!
//! Tasks are queued from any thread and run one at a time, in submission
//! order, on a dedicated named thread. A panicking task is logged and the
//! worker moves on to the next one.

use hubclock_common::error::{HubError, HubResult};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, warn};

/// Unit of work accepted by [`Worker`].
pub type WorkerTask = Box<dyn FnOnce() + Send + 'static>;

/// Task counters shared with the worker thread.
#[derive(Debug, Default)]
struct WorkerCounters {
    completed: AtomicU64,
    panicked: AtomicU64,
}

/// Worker thread with its own FIFO task queue.
///
/// Dropping the worker lets queued tasks finish, then joins the thread.
/// Must not be dropped from inside one of its own tasks; that case is
/// detected and the thread is detached instead of joined.
#[derive(Debug)]
pub struct Worker {
    name: String,
    sender: Option<Sender<WorkerTask>>,
    handle: Option<JoinHandle<()>>,
    counters: Arc<WorkerCounters>,
}

impl Worker {
    /// Spawn a worker thread named `name` and start processing tasks.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Worker`] if the thread cannot be spawned.
    pub fn spawn(name: &str) -> HubResult<Self> {
        let (sender, receiver) = mpsc::channel::<WorkerTask>();
        let counters = Arc::new(WorkerCounters::default());
        let thread_counters = Arc::clone(&counters);
        let thread_name = name.to_string();

        let handle = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                debug!(worker = %thread_name, "Worker thread started");

                // Ends once every sender is gone and the queue is drained
                for task in receiver {
                    match panic::catch_unwind(AssertUnwindSafe(task)) {
                        Ok(()) => {
                            thread_counters.completed.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(payload) => {
                            thread_counters.panicked.fetch_add(1, Ordering::Relaxed);
                            error!(
                                worker = %thread_name,
                                reason = panic_message(payload.as_ref()),
                                "task failed"
                            );
                        }
                    }
                }

                debug!(worker = %thread_name, "Worker thread stopped");
            })
            .map_err(|e| HubError::Worker(format!("failed to spawn worker thread {name}: {e}")))?;

        Ok(Self {
            name: name.to_string(),
            sender: Some(sender),
            handle: Some(handle),
            counters,
        })
    }

    /// Queue a task. Tasks run in the order they are added.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Worker`] if the worker thread has exited.
    pub fn add_task<F>(&self, task: F) -> HubResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| HubError::Worker(format!("worker {} is shut down", self.name)))?;
        sender.send(Box::new(task)).map_err(|_| {
            error!(worker = %self.name, "failed to add new task");
            HubError::Worker(format!("worker {} is no longer running", self.name))
        })
    }

    /// Thread name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tasks that ran to completion.
    #[must_use]
    pub fn completed_tasks(&self) -> u64 {
        self.counters.completed.load(Ordering::Relaxed)
    }

    /// Tasks that panicked.
    #[must_use]
    pub fn panicked_tasks(&self) -> u64 {
        self.counters.panicked.load(Ordering::Relaxed)
    }

    /// Stop accepting tasks, finish the queued ones and join the thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        // Closing the channel ends the task loop after the queue drains
        self.sender.take();

        if let Some(handle) = self.handle.take() {
            if handle.thread().id() == thread::current().id() {
                warn!(worker = %self.name, "worker dropped from its own thread, detaching");
                return;
            }
            if handle.join().is_err() {
                error!(worker = %self.name, "worker thread panicked");
            }
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
