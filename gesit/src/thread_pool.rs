use std::fmt;
use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use async_task::Runnable;
use crossbeam_channel::{unbounded, Receiver, Sender};

#[cfg(feature = "tracing")]
use log::trace;

use gesit_utils::abort_on_panic;

use crate::spawn::{set_current, BoxFuture, Executor, SpawnError};
use crate::task::{self, JoinHandle};

enum Message {
    Run(Runnable),
    Close,
}

struct PoolState {
    tx: Sender<Message>,
    rx: Receiver<Message>,

    /// number of live user handles, the pool shuts down when it hits zero
    cnt: AtomicUsize,

    shutdown: AtomicBool,

    size: usize,
}

impl PoolState {
    fn spawn<F>(self: &Arc<Self>, future: F) -> Result<JoinHandle<F::Output>, SpawnError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        if self.shutdown.load(Ordering::SeqCst) {
            return Err(SpawnError::ShutDown);
        }

        let (job, handle) = task::wrap(future);

        let schedule = {
            let state = self.clone();
            move |runnable| {
                let _ = state.tx.send(Message::Run(runnable));
            }
        };
        let (runnable, task) = async_task::spawn(job, schedule);
        task.detach();
        runnable.schedule();

        Ok(handle)
    }
}

type WorkerHook = Arc<dyn Fn(usize) + Send + Sync>;

fn worker_main(
    state: Arc<PoolState>,
    index: usize,
    after_start: Option<WorkerHook>,
    before_stop: Option<WorkerHook>,
) {
    #[cfg(feature = "tracing")]
    trace!("Worker({}) is started", index);

    if let Some(after_start) = after_start {
        after_start(index);
    }

    // tasks spawned from inside other tasks go through this
    let _current = set_current(Box::new(PoolSpawner {
        state: state.clone(),
    }));

    // a panic escaping the loop itself is a bug in the scheduler
    abort_on_panic(|| loop {
        match state.rx.recv() {
            Ok(Message::Run(runnable)) => {
                runnable.run();
            }
            Ok(Message::Close) | Err(_) => break,
        }
    });

    if let Some(before_stop) = before_stop {
        before_stop(index);
    }

    #[cfg(feature = "tracing")]
    trace!("Worker({}) is exiting", index);
}

/// A general-purpose thread pool for scheduling asynchronous tasks.
///
/// A fixed number of worker threads pull tasks from one shared queue.
/// The pool handle is cloneable; when the last handle is dropped the
/// workers finish the queued tasks and exit.
///
/// # Example
///
/// ```
/// use gesit::ThreadPool;
///
/// let pool = ThreadPool::new().unwrap();
///
/// let handle = pool.spawn(async { "1".to_owned() + "1" }).unwrap();
///
/// assert_eq!(gesit::block_on(handle).unwrap(), "11");
/// ```
pub struct ThreadPool {
    state: Arc<PoolState>,
}

impl ThreadPool {
    /// Create a pool with the default configuration, see
    /// [`ThreadPoolBuilder`]
    ///
    /// [`ThreadPoolBuilder`]: struct.ThreadPoolBuilder.html
    pub fn new() -> Result<ThreadPool, BuildError> {
        ThreadPoolBuilder::new().build()
    }

    /// Get a builder for a customized pool
    pub fn builder() -> ThreadPoolBuilder {
        ThreadPoolBuilder::new()
    }

    /// Spawn a task onto the pool, any idle worker will pick it up.
    ///
    /// Returns immediately with a [`JoinHandle`], decoupled from the
    /// execution of the task.
    ///
    /// # Errors
    ///
    /// Fails with [`SpawnError::ShutDown`] once pool shutdown has begun.
    ///
    /// [`JoinHandle`]: struct.JoinHandle.html
    /// [`SpawnError::ShutDown`]: enum.SpawnError.html
    pub fn spawn<F>(&self, future: F) -> Result<JoinHandle<F::Output>, SpawnError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.state.spawn(future)
    }
}

impl Clone for ThreadPool {
    fn clone(&self) -> ThreadPool {
        self.state.cnt.fetch_add(1, Ordering::Relaxed);
        ThreadPool {
            state: self.state.clone(),
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        if self.state.cnt.fetch_sub(1, Ordering::AcqRel) == 1 {
            #[cfg(feature = "tracing")]
            trace!("Pool is shutting down");

            self.state.shutdown.store(true, Ordering::SeqCst);

            // Close lands behind every already queued task
            for _ in 0..self.state.size {
                let _ = self.state.tx.send(Message::Close);
            }
        }
    }
}

impl Executor for ThreadPool {
    fn spawn_boxed(&self, future: BoxFuture) -> Result<(), SpawnError> {
        self.state.spawn(future).map(drop)
    }
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ThreadPool")
            .field("size", &self.state.size)
            .finish()
    }
}

/// Executor installed on worker threads, doesn't keep the pool alive
struct PoolSpawner {
    state: Arc<PoolState>,
}

impl Executor for PoolSpawner {
    fn spawn_boxed(&self, future: BoxFuture) -> Result<(), SpawnError> {
        self.state.spawn(future).map(drop)
    }
}

/// Thread pool configuration object.
pub struct ThreadPoolBuilder {
    pool_size: usize,
    stack_size: usize,
    name_prefix: Option<String>,
    after_start: Option<WorkerHook>,
    before_stop: Option<WorkerHook>,
}

impl ThreadPoolBuilder {
    /// Create a builder with the default configuration
    pub fn new() -> ThreadPoolBuilder {
        ThreadPoolBuilder {
            pool_size: num_cpus::get(),
            stack_size: 0,
            name_prefix: None,
            after_start: None,
            before_stop: None,
        }
    }

    /// Number of worker threads, defaults to the number of cpus on the
    /// host
    pub fn pool_size(&mut self, size: usize) -> &mut Self {
        self.pool_size = size;
        self
    }

    /// Stack size of the worker threads, in bytes
    pub fn stack_size(&mut self, stack_size: usize) -> &mut Self {
        self.stack_size = stack_size;
        self
    }

    /// Worker threads are named `{prefix}{index}`
    pub fn name_prefix<S: Into<String>>(&mut self, name_prefix: S) -> &mut Self {
        self.name_prefix = Some(name_prefix.into());
        self
    }

    /// Run right after a worker thread is started, with the worker index
    pub fn after_start<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.after_start = Some(Arc::new(f));
        self
    }

    /// Run right before a worker thread exits, with the worker index
    pub fn before_stop<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.before_stop = Some(Arc::new(f));
        self
    }

    /// Create the pool and start its workers.
    ///
    /// # Errors
    ///
    /// Fails when the pool size is zero, or when the OS refuses to start a
    /// worker thread.
    pub fn build(&mut self) -> Result<ThreadPool, BuildError> {
        if self.pool_size == 0 {
            return Err(BuildError::ZeroPoolSize);
        }

        let (tx, rx) = unbounded();
        let state = Arc::new(PoolState {
            tx,
            rx,
            cnt: AtomicUsize::new(1),
            shutdown: AtomicBool::new(false),
            size: self.pool_size,
        });

        #[cfg(feature = "tracing")]
        trace!("Pool is created with {} worker", self.pool_size);

        for index in 0..self.pool_size {
            let mut worker = thread::Builder::new();
            if let Some(name_prefix) = &self.name_prefix {
                worker = worker.name(format!("{}{}", name_prefix, index));
            }
            if self.stack_size > 0 {
                worker = worker.stack_size(self.stack_size);
            }

            let state = state.clone();
            let after_start = self.after_start.clone();
            let before_stop = self.before_stop.clone();
            worker
                .spawn(move || worker_main(state, index, after_start, before_stop))
                .map_err(BuildError::Spawn)?;
        }

        Ok(ThreadPool { state })
    }
}

impl Default for ThreadPoolBuilder {
    fn default() -> ThreadPoolBuilder {
        ThreadPoolBuilder::new()
    }
}

/// An error returned when a thread pool could not be built.
#[derive(Debug)]
pub enum BuildError {
    /// zero worker threads were requested
    ZeroPoolSize,

    /// the OS refused to start a worker thread
    Spawn(io::Error),
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BuildError::ZeroPoolSize => f.write_str("pool size must be nonzero"),
            BuildError::Spawn(err) => write!(f, "cannot start worker thread: {}", err),
        }
    }
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BuildError::ZeroPoolSize => None,
            BuildError::Spawn(err) => Some(err),
        }
    }
}
