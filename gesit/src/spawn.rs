use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::task::{self, JoinHandle};

/// Boxed task, as moved across the [`Executor`] boundary.
///
/// [`Executor`]: trait.Executor.html
pub type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Something that can run tasks in the background.
///
/// Implemented by [`ThreadPool`] and [`LocalExecutor`]. While a pool is
/// driving a thread it installs itself as that thread's current executor,
/// which is where [`spawn`] and [`spawn_with_handle`] send their task.
///
/// [`ThreadPool`]: struct.ThreadPool.html
/// [`LocalExecutor`]: struct.LocalExecutor.html
/// [`spawn`]: fn.spawn.html
/// [`spawn_with_handle`]: fn.spawn_with_handle.html
pub trait Executor {
    /// Spawn the task as a detached background task
    fn spawn_boxed(&self, future: BoxFuture) -> Result<(), SpawnError>;
}

thread_local! {
    static CURRENT: RefCell<Option<Box<dyn Executor>>> = RefCell::new(None);
}

pub(crate) struct CurrentGuard {
    prev: Option<Box<dyn Executor>>,
}

/// Install `executor` as the thread's current executor until the returned
/// guard is dropped.
pub(crate) fn set_current(executor: Box<dyn Executor>) -> CurrentGuard {
    let prev = CURRENT.with(|current| current.borrow_mut().replace(executor));
    CurrentGuard { prev }
}

impl Drop for CurrentGuard {
    fn drop(&mut self) {
        let prev = self.prev.take();
        CURRENT.with(|current| *current.borrow_mut() = prev);
    }
}

fn spawn_current(future: BoxFuture) -> Result<(), SpawnError> {
    CURRENT.with(|current| match current.borrow().as_ref() {
        Some(executor) => executor.spawn_boxed(future),
        None => Err(SpawnError::NoContext),
    })
}

/// An error returned when spawning a task fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpawnError {
    /// no executor is running on the current thread
    NoContext,

    /// the executor no longer accepts new tasks
    ShutDown,
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SpawnError::NoContext => f.write_str("no executor is running on this thread"),
            SpawnError::ShutDown => f.write_str("executor is shut down"),
        }
    }
}

impl std::error::Error for SpawnError {}

/// Spawn a task onto the executor that is driving the current thread.
///
/// This is lazy: nothing happen until the returned [`Spawn`] is polled,
/// usually by `await`-ing it from inside another task.
///
/// # Errors
///
/// Resolves to [`SpawnError::NoContext`] when no executor is running on
/// the thread, for example inside a plain [`block_on`].
///
/// [`Spawn`]: struct.Spawn.html
/// [`SpawnError::NoContext`]: enum.SpawnError.html
/// [`block_on`]: fn.block_on.html
pub fn spawn<F>(future: F) -> Spawn<F>
where
    F: Future<Output = ()> + Send + 'static,
{
    Spawn {
        future: Some(future),
    }
}

/// A future representing the completion of task spawning.
///
/// See [`spawn`]
///
/// [`spawn`]: fn.spawn.html
#[must_use = "futures do nothing unless polled"]
pub struct Spawn<F> {
    future: Option<F>,
}

impl<F> Unpin for Spawn<F> {}

impl<F> Future for Spawn<F>
where
    F: Future<Output = ()> + Send + 'static,
{
    type Output = Result<(), SpawnError>;

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let future = self
            .future
            .take()
            .expect("Spawn polled after it has completed");

        Poll::Ready(spawn_current(Box::pin(future)))
    }
}

/// Spawn a task onto the executor that is driving the current thread,
/// yielding a [`JoinHandle`] to the spawned task.
///
/// Lazy like [`spawn`].
///
/// [`JoinHandle`]: struct.JoinHandle.html
/// [`spawn`]: fn.spawn.html
pub fn spawn_with_handle<F>(future: F) -> SpawnWithHandle<F>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    SpawnWithHandle {
        future: Some(future),
    }
}

/// A future representing the completion of task spawning, yielding a
/// [`JoinHandle`] to the spawned task.
///
/// See [`spawn_with_handle`]
///
/// [`JoinHandle`]: struct.JoinHandle.html
/// [`spawn_with_handle`]: fn.spawn_with_handle.html
#[must_use = "futures do nothing unless polled"]
pub struct SpawnWithHandle<F> {
    future: Option<F>,
}

impl<F> Unpin for SpawnWithHandle<F> {}

impl<F> Future for SpawnWithHandle<F>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    type Output = Result<JoinHandle<F::Output>, SpawnError>;

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let future = self
            .future
            .take()
            .expect("SpawnWithHandle polled after it has completed");

        let (job, handle) = task::wrap(future);

        match spawn_current(Box::pin(job)) {
            Ok(()) => Poll::Ready(Ok(handle)),
            Err(err) => Poll::Ready(Err(err)),
        }
    }
}
