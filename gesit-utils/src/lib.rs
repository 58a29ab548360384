//! Helpers for building task executors.

use std::{
    future::Future,
    mem::forget,
    pin::Pin,
    process::abort,
    sync::Arc,
    task::{Context, Poll, RawWaker, RawWakerVTable, Waker},
};

use crossbeam_utils::sync::Unparker;

/// Call [`abort`] when `f` panic
///
/// [`abort`]: https://doc.rust-lang.org/std/process/fn.abort.html
pub fn abort_on_panic(f: impl FnOnce()) {
    struct Bomb;

    impl Drop for Bomb {
        fn drop(&mut self) {
            abort();
        }
    }

    let bomb = Bomb;

    f();

    forget(bomb);
}

/// Defer the execution until the scope is done
#[macro_export]
macro_rules! defer {
  ($($body:tt)*) => {
      let _guard = {
          struct Guard<F: FnOnce()>(Option<F>);

          impl<F: FnOnce()> Drop for Guard<F> {
            fn drop(&mut self) {
                  (self.0).take().map(|f| f());
              }
          }

          Guard(Some(|| {
              let _: () = { $($body)* };
          }))
      };
  };
}

/// Creates a future that wraps a function returning `Poll`.
///
/// Polling the future delegates to the wrapped function.
pub fn poll_fn<T, F>(f: F) -> impl Future<Output = T>
where
    F: FnMut(&mut Context<'_>) -> Poll<T>,
{
    PollFn { f }
}

struct PollFn<F> {
    f: F,
}

impl<F> Unpin for PollFn<F> {}

impl<T, F> Future for PollFn<F>
where
    F: FnMut(&mut Context<'_>) -> Poll<T>,
{
    type Output = T;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        (&mut self.f)(cx)
    }
}

/// Future that will yield multiple times
#[derive(Debug)]
pub struct Yields(pub usize);

impl Future for Yields {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<()> {
        if self.0 == 0 {
            Poll::Ready(())
        } else {
            self.0 -= 1;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

/// Create a [`Waker`] that call [`unpark`] when woken
///
/// [`Waker`]: https://doc.rust-lang.org/std/task/struct.Waker.html
/// [`unpark`]: https://docs.rs/crossbeam-utils/0.8/crossbeam_utils/sync/struct.Unparker.html#method.unpark
pub fn unparker_waker(unparker: Unparker) -> Waker {
    static VTABLE: RawWakerVTable = RawWakerVTable::new(
        //
        // clone: unsafe fn(*const ()) -> RawWaker
        |unparker| unsafe {
            let unparker = Arc::from_raw(unparker as *const Unparker);
            forget(unparker.clone());
            RawWaker::new(Arc::into_raw(unparker) as *const (), &VTABLE)
        },
        //
        // wake: unsafe fn(*const ())
        |unparker| unsafe {
            let unparker = Arc::from_raw(unparker as *const Unparker);
            unparker.unpark();
        },
        //
        // wake_by_ref: unsafe fn(*const ())
        |unparker| unsafe {
            (&*(unparker as *const Unparker)).unpark();
        },
        //
        // drop: unsafe fn(*const ())
        |unparker| unsafe {
            drop(Arc::from_raw(unparker as *const Unparker));
        },
    );

    let unparker = Arc::new(unparker);

    unsafe {
        Waker::from_raw(RawWaker::new(
            Arc::into_raw(unparker) as *const (),
            &VTABLE,
        ))
    }
}
