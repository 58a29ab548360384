use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_core::Stream;
use futures_timer::Delay;

use gesit_utils::Yields;

use gesit::{block_on, block_on_stream, LocalPool};

/// Counts upward, returning `Pending` with a self-wake before every item
/// so the iterator actually has to park.
struct Count {
    upto: Option<usize>,
    next: usize,
    pending: bool,
}

impl Count {
    fn upto(upto: usize) -> Count {
        Count {
            upto: Some(upto),
            next: 0,
            pending: true,
        }
    }

    fn endless() -> Count {
        Count {
            upto: None,
            next: 0,
            pending: true,
        }
    }
}

impl Stream for Count {
    type Item = usize;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<usize>> {
        if self.pending {
            self.pending = false;
            cx.waker().wake_by_ref();
            return Poll::Pending;
        }
        self.pending = true;

        match self.upto {
            Some(upto) if self.next >= upto => Poll::Ready(None),
            _ => {
                let value = self.next;
                self.next += 1;
                Poll::Ready(Some(value))
            }
        }
    }
}

#[test]
fn block_on_returns_output() {
    assert_eq!(block_on(async { 1 + 1 }), 2);
}

#[test]
fn block_on_parks_until_woken() {
    let out = block_on(async {
        Delay::new(Duration::from_millis(50)).await;
        "2"
    });
    assert_eq!(out, "2");
}

#[test]
fn block_on_matches_local_pool() {
    fn future() -> impl Future<Output = usize> {
        async {
            Yields(2).await;
            5
        }
    }

    assert_eq!(block_on(future()), LocalPool::new().run_until(future()));
}

#[test]
#[should_panic(expected = "executor is running")]
fn nested_block_on_panics() {
    block_on(async {
        block_on(async {});
    });
}

#[test]
#[should_panic(expected = "executor is running")]
fn block_on_inside_local_pool_panics() {
    let mut pool = LocalPool::new();
    pool.run_until(async {
        block_on(async {});
    });
}

#[test]
fn enter_guard_blocks_and_releases() {
    let guard = gesit::enter().unwrap();
    assert!(gesit::enter().is_err());

    drop(guard);
    gesit::enter().unwrap();
}

#[test]
fn stream_yields_exactly_k_then_ends() {
    let mut iter = block_on_stream(Count::upto(4));

    assert_eq!(iter.next(), Some(0));
    assert_eq!(iter.next(), Some(1));
    assert_eq!(iter.next(), Some(2));
    assert_eq!(iter.next(), Some(3));
    assert_eq!(iter.next(), None);
}

#[test]
fn stream_collects() {
    let all: Vec<usize> = block_on_stream(Count::upto(10)).collect();
    assert_eq!(all, (0..10).collect::<Vec<usize>>());
}

#[test]
fn endless_stream_blocks_per_pull() {
    let mut iter = block_on_stream(Count::endless());

    for expected in 0..100 {
        assert_eq!(iter.next(), Some(expected));
    }
}

#[test]
fn into_inner_returns_the_stream() {
    let mut iter = block_on_stream(Count::upto(2));
    assert_eq!(iter.next(), Some(0));

    let mut stream = iter.into_inner();

    // the stream keeps its position
    let rest: Vec<usize> = block_on_stream(&mut stream).collect();
    assert_eq!(rest, [1]);
}
