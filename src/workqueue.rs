//! A fixed-size pool of worker threads that run queued native calls.

use std::panic::{self, AssertUnwindSafe};
use std::sync::LazyLock;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use crate::config::crate_option;
use crate::errors::{GdalError, Result};

/// A unit of work queued to the pool.
pub type WorkUnit = Box<dyn FnOnce() + Send + 'static>;

enum MessageToWorker {
    /// A work unit.
    Work(WorkUnit),
    /// Shut down the worker thread.
    Halt,
}

/// A queue that distributes work items to a fixed set of worker threads.
///
/// Pushing blocks while the queue holds `queue_depth` pending items.
pub struct WorkQueue {
    dispatcher: Mutex<Option<Sender<MessageToWorker>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_count: usize,
}

static GLOBAL_QUEUE: LazyLock<WorkQueue> = LazyLock::new(|| {
    let workers = crate_option("GDAL_ASYNC_WORKERS").unwrap_or_else(|| {
        thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    });
    let queue_depth = crate_option("GDAL_ASYNC_QUEUE_DEPTH").unwrap_or(256);
    WorkQueue::create(workers, queue_depth)
});

impl WorkQueue {
    /// Create a new work queue served by `worker_count` threads.
    ///
    /// With `worker_count == 0` no threads are started and every work unit runs
    /// inline on the thread that pushes it.
    pub fn create(worker_count: usize, queue_depth: usize) -> WorkQueue {
        if worker_count == 0 {
            log::debug!("work queue running inline");
            return WorkQueue {
                dispatcher: Mutex::new(None),
                workers: Mutex::new(Vec::new()),
                worker_count,
            };
        }

        let (dispatcher, inbox) = crossbeam_channel::bounded::<MessageToWorker>(queue_depth.max(1));
        let workers = (0..worker_count)
            .map(|i| {
                let inbox = inbox.clone();
                thread::Builder::new()
                    .name(format!("gdal-async-{i}"))
                    .spawn(move || Self::run_worker(inbox))
            })
            .filter_map(|spawned| match spawned {
                Ok(handle) => Some(handle),
                Err(e) => {
                    log::error!("unable to spawn worker thread: {e}");
                    None
                }
            })
            .collect();
        log::debug!("started work queue with {worker_count} workers, depth {queue_depth}");

        WorkQueue {
            dispatcher: Mutex::new(Some(dispatcher)),
            workers: Mutex::new(workers),
            worker_count,
        }
    }

    /// The process-wide queue used by all `*_async` methods.
    ///
    /// Sized from the `GDAL_ASYNC_WORKERS` and `GDAL_ASYNC_QUEUE_DEPTH` config
    /// options the first time it is used.
    pub fn global() -> &'static WorkQueue {
        &GLOBAL_QUEUE
    }

    fn run_worker(inbox: Receiver<MessageToWorker>) {
        loop {
            match inbox.recv() {
                Ok(MessageToWorker::Work(work)) => {
                    // a panicking work unit settles its own future on unwind
                    if panic::catch_unwind(AssertUnwindSafe(work)).is_err() {
                        log::error!("work unit panicked");
                    }
                }
                Ok(MessageToWorker::Halt) | Err(_) => return,
            }
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Push a work item to this queue.
    pub fn push(&self, work: WorkUnit) -> Result<()> {
        if self.worker_count == 0 {
            work();
            return Ok(());
        }
        let dispatcher = self.dispatcher.lock().clone();
        match dispatcher {
            Some(dispatcher) => dispatcher
                .send(MessageToWorker::Work(work))
                .map_err(|_| GdalError::WorkerPoolClosed),
            None => Err(GdalError::WorkerPoolClosed),
        }
    }

    /// Stops accepting work, lets queued items finish and joins the workers.
    pub fn shutdown(&self) {
        let Some(dispatcher) = self.dispatcher.lock().take() else {
            return;
        };
        for _ in 0..self.worker_count {
            let _ = dispatcher.send(MessageToWorker::Halt);
        }
        drop(dispatcher);
        for worker in self.workers.lock().drain(..) {
            let _ = worker.join();
        }
    }
}

impl Drop for WorkQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded as channel;

    #[test]
    fn test_queue() {
        let queue = WorkQueue::create(3, 4);
        let receivers: Vec<_> = (0..10)
            .map(|c| {
                let (rv, wait_for_rv) = channel();
                queue
                    .push(Box::new(move || rv.send(c * 2).unwrap()))
                    .unwrap();
                wait_for_rv
            })
            .collect();

        let return_list: Vec<i32> = receivers.iter().map(|rv| rv.recv().unwrap()).collect();
        assert_eq!(return_list, vec![0, 2, 4, 6, 8, 10, 12, 14, 16, 18]);
    }

    #[test]
    fn test_inline_queue() {
        let queue = WorkQueue::create(0, 0);
        let (rv, wait_for_rv) = channel();
        queue.push(Box::new(move || rv.send(thread::current().id()).unwrap())).unwrap();
        assert_eq!(wait_for_rv.recv().unwrap(), thread::current().id());
    }

    #[test]
    fn test_push_after_shutdown() {
        let queue = WorkQueue::create(2, 2);
        queue.shutdown();
        let err = queue.push(Box::new(|| ())).unwrap_err();
        assert!(matches!(err, GdalError::WorkerPoolClosed));
    }

    #[test]
    fn test_workers_run_in_parallel() {
        let queue = WorkQueue::create(2, 2);
        let (arrived, wait_for_arrival) = channel();
        let (go, gate) = channel::<()>();
        for _ in 0..2 {
            let arrived = arrived.clone();
            let gate = gate.clone();
            queue
                .push(Box::new(move || {
                    arrived.send(()).unwrap();
                    let _ = gate.recv();
                }))
                .unwrap();
        }
        // both units are blocked at the same time, one per worker
        wait_for_arrival.recv().unwrap();
        wait_for_arrival.recv().unwrap();
        drop(go);
        queue.shutdown();
    }

    #[test]
    fn test_worker_survives_panic() {
        let queue = WorkQueue::create(1, 2);
        queue.push(Box::new(|| panic!("boom"))).unwrap();
        let (rv, wait_for_rv) = channel();
        queue.push(Box::new(move || rv.send(42).unwrap())).unwrap();
        assert_eq!(wait_for_rv.recv().unwrap(), 42);
    }
}
