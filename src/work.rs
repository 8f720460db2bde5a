//! Asynchronous dispatch of native calls.
//!
//! Every `*_async` method in this crate runs the matching synchronous method on a
//! [`WorkQueue`] and hands back a [`Pending`]. A `Pending` is a [`Future`] and can
//! additionally carry a completion callback; whichever is used, the operation settles
//! exactly once.
//!
//! ```rust, no_run
//! use gdal_async::Dataset;
//!
//! # fn main() -> gdal_async::errors::Result<()> {
//! let dataset = Dataset::open("fixtures/tinymarble.tif")?;
//! let band = dataset.bands().get(1)?;
//! let pixels = band
//!     .pixels()
//!     .read_async::<u8>((0, 0), (10, 10), None)
//!     .on_complete(|result| {
//!         if let Err(e) = result {
//!             eprintln!("read failed: {e}");
//!         }
//!     })
//!     .wait()?;
//! assert_eq!(pixels.len(), 100);
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::marker::PhantomPinned;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use parking_lot::Mutex;

use crate::errors::{GdalError, Result};
use crate::handle::Guarded;
use crate::workqueue::WorkQueue;

type Callback<T> = Box<dyn FnOnce(std::result::Result<&T, &GdalError>) + Send + 'static>;

enum Slot<T> {
    Waiting {
        waker: Option<Waker>,
        callback: Option<Callback<T>>,
    },
    Settled(Result<T>),
    Taken,
}

struct Shared<T> {
    slot: Mutex<Slot<T>>,
}

/// The eventual result of an operation queued with a `*_async` method.
///
/// Await it, block on it with [`Pending::wait`], or attach a callback with
/// [`Pending::on_complete`]. Nothing is cancelled when a `Pending` is dropped; the
/// queued operation still runs.
#[must_use = "the result of the operation is lost unless the Pending is awaited or given a callback"]
pub struct Pending<T> {
    shared: Arc<Shared<T>>,
    // once polled, a Pending cannot be moved, so a callback can never be attached
    // after the value was taken
    _pin: PhantomPinned,
}

/// The settling half of a [`Pending`].
pub(crate) struct Settle<T> {
    shared: Option<Arc<Shared<T>>>,
}

impl<T: Send + 'static> Pending<T> {
    pub(crate) fn new() -> (Pending<T>, Settle<T>) {
        let shared = Arc::new(Shared {
            slot: Mutex::new(Slot::Waiting {
                waker: None,
                callback: None,
            }),
        });
        let settle = Settle {
            shared: Some(Arc::clone(&shared)),
        };
        (
            Pending {
                shared,
                _pin: PhantomPinned,
            },
            settle,
        )
    }

    /// An operation that has already failed.
    pub(crate) fn rejected(err: GdalError) -> Pending<T> {
        let (pending, settle) = Pending::new();
        settle.settle(Err(err));
        pending
    }

    /// Registers a callback that receives the outcome once the operation settles.
    ///
    /// If the operation has already settled the callback runs immediately on the
    /// calling thread, otherwise it runs on the worker thread that settles it.
    pub fn on_complete<F>(self, callback: F) -> Self
    where
        F: FnOnce(std::result::Result<&T, &GdalError>) + Send + 'static,
    {
        let mut slot = self.shared.slot.lock();
        match &mut *slot {
            Slot::Waiting { callback: cb, .. } => {
                if cb.is_some() {
                    log::warn!("replacing an already registered completion callback");
                }
                *cb = Some(Box::new(callback));
            }
            Slot::Settled(result) => run_callback(Box::new(callback), result),
            Slot::Taken => log::warn!("completion callback registered after the result was taken"),
        }
        drop(slot);
        self
    }

    /// Whether the operation has finished.
    pub fn is_settled(&self) -> bool {
        matches!(&*self.shared.slot.lock(), Slot::Settled(_))
    }

    /// Blocks the current thread until the operation settles.
    pub fn wait(self) -> Result<T> {
        futures::executor::block_on(self)
    }
}

impl<T> Future for Pending<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = self.shared.slot.lock();
        match std::mem::replace(&mut *slot, Slot::Taken) {
            Slot::Settled(result) => Poll::Ready(result),
            Slot::Waiting { callback, .. } => {
                *slot = Slot::Waiting {
                    waker: Some(cx.waker().clone()),
                    callback,
                };
                Poll::Pending
            }
            Slot::Taken => panic!("Pending polled after completion"),
        }
    }
}

impl<T> Settle<T> {
    /// Settles the operation: runs the callback, then stores the result and wakes the future.
    pub(crate) fn settle(mut self, result: Result<T>) {
        if let Some(shared) = self.shared.take() {
            Self::settle_shared(&shared, result);
        }
    }

    fn settle_shared(shared: &Shared<T>, result: Result<T>) {
        loop {
            let mut slot = shared.slot.lock();
            let Slot::Waiting { waker, callback } = &mut *slot else {
                return;
            };
            // callbacks run unlocked; one registered meanwhile is picked up next round
            if let Some(callback) = callback.take() {
                drop(slot);
                run_callback(callback, &result);
                continue;
            }
            let waker = waker.take();
            *slot = Slot::Settled(result);
            drop(slot);
            if let Some(waker) = waker {
                waker.wake();
            }
            return;
        }
    }
}

/// Runs a completion callback; a panic in it is logged and does not affect the result.
fn run_callback<T>(callback: Callback<T>, result: &Result<T>) {
    if panic::catch_unwind(AssertUnwindSafe(|| callback(result.as_ref()))).is_err() {
        log::error!("completion callback panicked");
    }
}

impl<T> Drop for Settle<T> {
    fn drop(&mut self) {
        // the work unit was dropped without running: the queue shut down or it panicked
        if let Some(shared) = self.shared.take() {
            Self::settle_shared(&shared, Err(GdalError::WorkerPoolClosed));
        }
    }
}

/// Runs `op` on the global work queue.
pub(crate) fn spawn<T, F>(op: F) -> Pending<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    spawn_on_queue(WorkQueue::global(), op)
}

pub(crate) fn spawn_on_queue<T, F>(queue: &WorkQueue, op: F) -> Pending<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let (pending, settle) = Pending::new();
    // a failed push drops the work unit, which settles it as WorkerPoolClosed
    let _ = queue.push(Box::new(move || settle.settle(op())));
    pending
}

/// Runs `op` against `target` on the global work queue.
///
/// The call is rejected without running when `target` is already destroyed when
/// a worker picks it up. A value produced while `target` was being destroyed is
/// discarded in favour of an `AlreadyDestroyed` error.
pub(crate) fn spawn_guarded<H, T, F>(target: &H, op: F) -> Pending<T>
where
    H: Guarded,
    T: Send + 'static,
    F: FnOnce(&H) -> Result<T> + Send + 'static,
{
    spawn_guarded_on_queue(WorkQueue::global(), target, op)
}

pub(crate) fn spawn_guarded_on_queue<H, T, F>(queue: &WorkQueue, target: &H, op: F) -> Pending<T>
where
    H: Guarded,
    T: Send + 'static,
    F: FnOnce(&H) -> Result<T> + Send + 'static,
{
    if let Err(e) = target.liveness().check() {
        return Pending::rejected(e);
    }
    let target = target.clone();
    log::trace!("queueing {} operation", target.liveness().kind());
    spawn_on_queue(queue, move || {
        target.liveness().check()?;
        let result = op(&target);
        match result {
            Ok(_) if target.liveness().is_destroyed() => Err(target.liveness().destroyed_err()),
            result => result,
        }
    })
}
