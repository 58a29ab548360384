use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crossbeam_utils::sync::Parker;
use futures_core::Stream;

use gesit_utils::{poll_fn, unparker_waker};

use crate::enter::enter;

/// Run a future to completion on the current thread.
///
/// A minimal inline executor: the future is polled on the spot and the
/// thread is parked between wakes, nothing else runs in the meantime.
///
/// # Panics
///
/// Panics when called from inside a running executor, including another
/// `block_on`.
///
/// # Example
///
/// ```
/// assert_eq!(gesit::block_on(async { 1 + 1 }), 2);
/// ```
pub fn block_on<F: Future>(mut future: F) -> F::Output {
    let _enter =
        enter().expect("cannot block on a future while an executor is running on this thread");

    let parker = Parker::new();
    let waker = unparker_waker(parker.unparker().clone());
    let mut cx = Context::from_waker(&waker);

    let mut future = unsafe { Pin::new_unchecked(&mut future) };
    loop {
        match future.as_mut().poll(&mut cx) {
            Poll::Ready(value) => return value,
            Poll::Pending => parker.park(),
        }
    }
}

/// Turn a stream into a blocking iterator.
///
/// Each call to `next` blocks the thread until the stream yields its next
/// element, or signals that it is exhausted. The stream itself is only
/// driven while `next` is being called.
pub fn block_on_stream<S>(stream: S) -> BlockingStream<S>
where
    S: Stream + Unpin,
{
    BlockingStream { stream }
}

/// An iterator which blocks on values from a stream until they become
/// available.
///
/// See [`block_on_stream`]
///
/// [`block_on_stream`]: fn.block_on_stream.html
#[derive(Debug)]
pub struct BlockingStream<S> {
    stream: S,
}

impl<S> BlockingStream<S> {
    /// Convert back into the underlying stream
    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl<S> Iterator for BlockingStream<S>
where
    S: Stream + Unpin,
{
    type Item = S::Item;

    fn next(&mut self) -> Option<S::Item> {
        let stream = &mut self.stream;
        block_on(poll_fn(|cx| Pin::new(&mut *stream).poll_next(cx)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.stream.size_hint()
    }
}
