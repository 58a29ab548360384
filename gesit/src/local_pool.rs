use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use async_task::Runnable;
use crossbeam_deque::{Injector, Steal};
use crossbeam_utils::sync::{Parker, Unparker};
use crossbeam_utils::Backoff;

use gesit_utils::{defer, unparker_waker};

use crate::enter::enter;
use crate::spawn::{set_current, BoxFuture, Executor, SpawnError};
use crate::task::{self, JoinHandle};

struct Shared {
    /// queue of runnable task
    ///
    /// wakes can arrive from any thread, so the queue is thread-safe even
    /// though the tasks themselves never leave the pool thread
    queue: Injector<Runnable>,

    /// number of task that is not done yet
    len: AtomicUsize,

    unparker: Unparker,
}

/// A single-threaded task pool.
///
/// Tasks spawned here run on the thread that owns the pool, and they don't
/// need to be `Send`. The pool itself can't be sent to another thread.
///
/// # Example
///
/// ```
/// use gesit::LocalPool;
///
/// let mut pool = LocalPool::new();
///
/// let handle = pool.spawn(async { 40 + 2 });
///
/// pool.run();
/// assert_eq!(pool.run_until(handle).unwrap(), 42);
/// ```
pub struct LocalPool {
    shared: Arc<Shared>,
    parker: Parker,

    // !Send + !Sync
    _marker: PhantomData<*mut ()>,
}

impl LocalPool {
    /// Create a new, empty pool
    pub fn new() -> LocalPool {
        let parker = Parker::new();

        LocalPool {
            shared: Arc::new(Shared {
                queue: Injector::new(),
                len: AtomicUsize::new(0),
                unparker: parker.unparker().clone(),
            }),
            parker,
            _marker: PhantomData,
        }
    }

    /// Get a cloneable handle to the pool that implements [`Executor`]
    ///
    /// [`Executor`]: trait.Executor.html
    pub fn executor(&self) -> LocalExecutor {
        LocalExecutor {
            shared: Arc::downgrade(&self.shared),
            _marker: PhantomData,
        }
    }

    /// Spawn a task onto the pool.
    ///
    /// The task is enqueued at the back of the run queue, nothing run until
    /// [`run`] or [`run_until`] is called.
    ///
    /// [`run`]: #method.run
    /// [`run_until`]: #method.run_until
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + 'static,
        F::Output: 'static,
    {
        spawn_onto(&self.shared, future)
    }

    /// Run all tasks in the pool to completion.
    ///
    /// Parks the thread whenever every queued task is waiting on an
    /// external wake, and returns exactly when no live task remains.
    ///
    /// # Panics
    ///
    /// Panics when another executor is already running on this thread.
    pub fn run(&mut self) {
        let _enter = enter()
            .expect("cannot run a LocalPool while another executor is running on this thread");
        let _current = set_current(Box::new(self.executor()));

        loop {
            self.drain();

            if self.shared.len.load(Ordering::Relaxed) == 0 {
                return;
            }

            self.parker.park();
        }
    }

    /// Run the pool until the given future completes, and return its
    /// output.
    ///
    /// Spawned tasks are driven alongside `future`; tasks that are still
    /// pending when `future` completes stay in the queue for a later
    /// [`run`] or [`run_until`].
    ///
    /// # Panics
    ///
    /// Panics when another executor is already running on this thread.
    ///
    /// [`run`]: #method.run
    /// [`run_until`]: #method.run_until
    pub fn run_until<F: Future>(&mut self, mut future: F) -> F::Output {
        let _enter = enter()
            .expect("cannot run a LocalPool while another executor is running on this thread");
        let _current = set_current(Box::new(self.executor()));

        let waker = unparker_waker(self.shared.unparker.clone());
        let mut cx = Context::from_waker(&waker);

        let mut future = unsafe { Pin::new_unchecked(&mut future) };
        loop {
            if let Poll::Ready(value) = future.as_mut().poll(&mut cx) {
                return value;
            }

            self.drain();

            self.parker.park();
        }
    }

    /// Run every task that is currently runnable, in FIFO order
    fn drain(&self) {
        let backoff = Backoff::new();
        loop {
            match self.shared.queue.steal() {
                Steal::Success(runnable) => {
                    runnable.run();
                }
                Steal::Empty => return,
                Steal::Retry => backoff.snooze(),
            }
        }
    }
}

impl Default for LocalPool {
    fn default() -> LocalPool {
        LocalPool::new()
    }
}

fn spawn_onto<F>(shared: &Arc<Shared>, future: F) -> JoinHandle<F::Output>
where
    F: Future + 'static,
    F::Output: 'static,
{
    let (job, handle) = task::wrap(future);

    // tasks hold the pool only weakly, dropping the pool cancels
    // whatever is still queued
    shared.len.fetch_add(1, Ordering::Relaxed);
    let counter = Arc::downgrade(shared);
    let job = async move {
        defer! {
            if let Some(shared) = counter.upgrade() {
                shared.len.fetch_sub(1, Ordering::Relaxed);
            }
        }
        job.await
    };

    let schedule = {
        let weak = Arc::downgrade(shared);
        move |runnable| {
            if let Some(shared) = weak.upgrade() {
                shared.queue.push(runnable);
                shared.unparker.unpark();
            }
        }
    };
    let (runnable, task) = async_task::spawn_local(job, schedule);
    task.detach();
    runnable.schedule();

    handle
}

/// A handle to a [`LocalPool`] that implements [`Executor`].
///
/// Unlike the pool itself the handle is cloneable, so it can be moved into
/// tasks to spawn more work. It can't leave the pool's thread.
///
/// [`LocalPool`]: struct.LocalPool.html
/// [`Executor`]: trait.Executor.html
#[derive(Clone)]
pub struct LocalExecutor {
    shared: Weak<Shared>,

    // !Send + !Sync
    _marker: PhantomData<*mut ()>,
}

impl LocalExecutor {
    /// Spawn a task onto the pool this handle came from.
    ///
    /// # Errors
    ///
    /// Fails with [`SpawnError::ShutDown`] when the pool has been dropped.
    ///
    /// [`SpawnError::ShutDown`]: enum.SpawnError.html
    pub fn spawn_local<F>(&self, future: F) -> Result<JoinHandle<F::Output>, SpawnError>
    where
        F: Future + 'static,
        F::Output: 'static,
    {
        match self.shared.upgrade() {
            Some(shared) => Ok(spawn_onto(&shared, future)),
            None => Err(SpawnError::ShutDown),
        }
    }
}

impl Executor for LocalExecutor {
    fn spawn_boxed(&self, future: BoxFuture) -> Result<(), SpawnError> {
        self.spawn_local(future).map(drop)
    }
}
