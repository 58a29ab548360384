use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

#[cfg(feature = "tracing")]
use std::sync::atomic::{AtomicUsize, Ordering};

#[cfg(feature = "tracing")]
use log::trace;

/// An error produced when a task fails instead of producing its output.
///
/// The only way a task can fail is by panicking. The panic never reaches
/// the executor, it is captured and reported here, through the task's
/// [`JoinHandle`].
///
/// [`JoinHandle`]: struct.JoinHandle.html
#[derive(Debug, Clone)]
pub struct TaskError {
    message: Cow<'static, str>,
}

impl TaskError {
    fn from_panic(payload: Box<dyn Any + Send>) -> TaskError {
        let message = match payload.downcast::<&'static str>() {
            Ok(message) => Cow::Borrowed(*message),
            Err(payload) => match payload.downcast::<String>() {
                Ok(message) => Cow::Owned(*message),
                Err(_) => Cow::Borrowed("task panicked"),
            },
        };

        TaskError { message }
    }

    /// Panic message of the failed task, when one could be captured
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "task failed: {}", self.message)
    }
}

impl std::error::Error for TaskError {}

struct Slot<T> {
    result: Option<Result<T, TaskError>>,
    waker: Option<Waker>,
}

struct Inner<T> {
    slot: Mutex<Slot<T>>,
}

impl<T> Inner<T> {
    fn complete(&self, result: Result<T, TaskError>) {
        let mut slot = self
            .slot
            .lock()
            .expect("acquiring result slot when completing task");

        slot.result = Some(result);
        let waker = slot.waker.take();

        drop(slot);

        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

/// The type of future returned when spawning a task, proxies the output of
/// the task running on the executor.
///
/// Resolves to the task's output, or to a [`TaskError`] when the task
/// panicked.
///
/// Dropping a `JoinHandle` doesn't cancel the task, the task still run to
/// completion, only its result is discarded.
///
/// [`TaskError`]: struct.TaskError.html
pub struct JoinHandle<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Future for JoinHandle<T> {
    type Output = Result<T, TaskError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = self
            .inner
            .slot
            .lock()
            .expect("acquiring result slot when polling JoinHandle");

        if let Some(result) = slot.result.take() {
            return Poll::Ready(result);
        }

        let need_to_store = match &slot.waker {
            Some(waker) => !waker.will_wake(cx.waker()),
            None => true,
        };
        if need_to_store {
            slot.waker = Some(cx.waker().clone());
        }

        Poll::Pending
    }
}

impl<T> fmt::Debug for JoinHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("JoinHandle { .. }")
    }
}

/// Completion half of a [`JoinHandle`], wrapping the spawned future.
///
/// Always completes with `()`, and never unwind into the executor: a panic
/// from the wrapped future is captured and routed to the handle.
///
/// [`JoinHandle`]: struct.JoinHandle.html
pub(crate) struct Job<F: Future> {
    future: F,
    inner: Arc<Inner<F::Output>>,

    #[cfg(feature = "tracing")]
    id: usize,
}

pub(crate) fn wrap<F: Future>(future: F) -> (Job<F>, JoinHandle<F::Output>) {
    let inner = Arc::new(Inner {
        slot: Mutex::new(Slot {
            result: None,
            waker: None,
        }),
    });

    #[cfg(feature = "tracing")]
    let id = {
        static JOB_ID_COUNTER: AtomicUsize = AtomicUsize::new(0);
        JOB_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
    };

    #[cfg(feature = "tracing")]
    trace!("Job({}) is created", id);

    let job = Job {
        future,
        inner: inner.clone(),

        #[cfg(feature = "tracing")]
        id,
    };

    (job, JoinHandle { inner })
}

impl<F: Future> Future for Job<F> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        // `future` is the only structurally pinned field
        let this = unsafe { self.get_unchecked_mut() };
        let future = unsafe { Pin::new_unchecked(&mut this.future) };

        match catch_unwind(AssertUnwindSafe(|| future.poll(cx))) {
            Ok(Poll::Pending) => Poll::Pending,

            Ok(Poll::Ready(value)) => {
                #[cfg(feature = "tracing")]
                trace!("Job({}) is done", this.id);

                this.inner.complete(Ok(value));
                Poll::Ready(())
            }

            Err(payload) => {
                let err = TaskError::from_panic(payload);

                #[cfg(feature = "tracing")]
                trace!("Job({}) panicked: {}", this.id, err.message());

                this.inner.complete(Err(err));
                Poll::Ready(())
            }
        }
    }
}
