use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use futures_timer::Delay;

use gesit::{BuildError, SpawnError, ThreadPool};

#[test]
fn all_tasks_complete_exactly_once() {
    let pool = ThreadPool::builder().pool_size(4).build().unwrap();
    let count = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..100 {
        let count = count.clone();
        handles.push(
            pool.spawn(async move {
                count.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap(),
        );
    }

    for handle in handles {
        gesit::block_on(handle).unwrap();
    }

    assert_eq!(count.load(Ordering::SeqCst), 100);
}

#[test]
fn zero_pool_size_fails() {
    match ThreadPool::builder().pool_size(0).build() {
        Err(BuildError::ZeroPoolSize) => {}
        _ => panic!("expected ZeroPoolSize"),
    }
}

// one value task, one delayed task, one panicking task, and the pool
// stays usable afterwards
#[test]
fn mixed_outcomes_on_two_workers() {
    let pool = ThreadPool::builder().pool_size(2).build().unwrap();

    let a = pool.spawn(async { "1".to_owned() + "1" }).unwrap();
    let b = pool
        .spawn(async {
            Delay::new(Duration::from_millis(50)).await;
            "2".to_owned()
        })
        .unwrap();
    let c = pool
        .spawn(async {
            panic!("boom");
        })
        .unwrap();

    assert_eq!(gesit::block_on(a).unwrap(), "11");
    assert_eq!(gesit::block_on(b).unwrap(), "2");
    assert_eq!(gesit::block_on(c).unwrap_err().message(), "boom");

    let again = pool.spawn(async { 3 }).unwrap();
    assert_eq!(gesit::block_on(again).unwrap(), 3);
}

#[test]
fn worker_threads_are_named() {
    let pool = ThreadPool::builder()
        .pool_size(2)
        .name_prefix("gesit-test-")
        .build()
        .unwrap();

    let handle = pool
        .spawn(async {
            thread::current().name().map(str::to_owned)
        })
        .unwrap();

    let name = gesit::block_on(handle).unwrap().unwrap();
    assert!(name.starts_with("gesit-test-"));
}

#[test]
fn hooks_run_once_per_worker() {
    // hooks must be Sync, so no std mpsc sender in there
    let (started_tx, started_rx) = crossbeam_channel::unbounded();
    let (stopped_tx, stopped_rx) = crossbeam_channel::unbounded();

    let pool = ThreadPool::builder()
        .pool_size(3)
        .after_start(move |index| started_tx.send(index).unwrap())
        .before_stop(move |index| stopped_tx.send(index).unwrap())
        .build()
        .unwrap();

    let mut started: Vec<usize> = (0..3).map(|_| started_rx.recv().unwrap()).collect();
    started.sort();
    assert_eq!(started, [0, 1, 2]);

    drop(pool);

    let mut stopped: Vec<usize> = (0..3)
        .map(|_| stopped_rx.recv_timeout(Duration::from_secs(5)).unwrap())
        .collect();
    stopped.sort();
    assert_eq!(stopped, [0, 1, 2]);
}

#[test]
fn queued_tasks_still_run_after_last_handle_drop() {
    let pool = ThreadPool::builder().pool_size(1).build().unwrap();
    let (tx, rx) = mpsc::channel();

    let tx2 = tx.clone();
    pool.spawn(async move { tx2.send(1).unwrap() }).unwrap();
    pool.spawn(async move { tx.send(2).unwrap() }).unwrap();
    drop(pool);

    let mut got = vec![
        rx.recv_timeout(Duration::from_secs(5)).unwrap(),
        rx.recv_timeout(Duration::from_secs(5)).unwrap(),
    ];
    got.sort();
    assert_eq!(got, [1, 2]);
}

#[test]
fn spawn_after_shutdown_fails() {
    let pool = ThreadPool::builder().pool_size(1).build().unwrap();

    let (go_tx, go_rx) = mpsc::channel::<()>();
    let (result_tx, result_rx) = mpsc::channel();

    let handle = pool
        .spawn(async move {
            // hold the worker until the pool has started shutting down
            go_rx.recv().unwrap();
            let spawned = gesit::spawn(async {}).await;
            result_tx.send(spawned).unwrap();
        })
        .unwrap();

    drop(pool);
    go_tx.send(()).unwrap();

    let spawned = result_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(spawned.unwrap_err(), SpawnError::ShutDown);

    gesit::block_on(handle).unwrap();
}

#[test]
fn dropping_handle_does_not_cancel() {
    let pool = ThreadPool::builder().pool_size(1).build().unwrap();
    let (tx, rx) = mpsc::channel();

    let handle = pool
        .spawn(async move {
            Delay::new(Duration::from_millis(50)).await;
            tx.send(()).unwrap();
        })
        .unwrap();
    drop(handle);

    rx.recv_timeout(Duration::from_secs(5)).unwrap();
}

#[test]
fn cloned_handle_keeps_pool_alive() {
    let pool = ThreadPool::builder().pool_size(1).build().unwrap();
    let pool2 = pool.clone();
    drop(pool);

    let handle = pool2.spawn(async { 1 }).unwrap();
    assert_eq!(gesit::block_on(handle).unwrap(), 1);
}

#[test]
fn spawn_from_inside_a_task() {
    let pool = ThreadPool::builder().pool_size(2).build().unwrap();

    let handle = pool
        .spawn(async {
            let inner = gesit::spawn_with_handle(async { 7 }).await.unwrap();
            inner.await.unwrap()
        })
        .unwrap();

    assert_eq!(gesit::block_on(handle).unwrap(), 7);
}

#[test]
fn tasks_spread_across_workers() {
    let pool = ThreadPool::builder()
        .pool_size(4)
        .stack_size(1 << 20)
        .build()
        .unwrap();
    let (tx, rx) = mpsc::channel();

    for _ in 0..4 {
        let tx = tx.clone();
        pool.spawn(async move {
            tx.send(thread::current().id()).unwrap();
            // keep the worker busy so the other tasks land elsewhere
            thread::sleep(Duration::from_millis(100));
        })
        .unwrap();
    }
    drop(tx);

    let mut seen = Vec::new();
    while let Ok(id) = rx.recv_timeout(Duration::from_secs(5)) {
        seen.push(id);
    }
    assert_eq!(seen.len(), 4);

    let unique: HashSet<_> = seen.into_iter().collect();
    assert!(unique.len() > 1);
}
