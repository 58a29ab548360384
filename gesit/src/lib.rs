//! Task executor for futures, local and pooled.
//!
//! Two executors are provided:
//!
//! - [`LocalPool`]: runs tasks on the current thread, the tasks don't need
//!   to be `Send`
//! - [`ThreadPool`]: runs tasks on a fixed number of worker threads,
//!   pulled from one shared queue
//!
//! Spawning returns a [`JoinHandle`], a future that resolves to the task's
//! output, or to a [`TaskError`] when the task panicked. Dropping the
//! handle doesn't cancel the task, it only detaches you from the result.
//!
//! [`block_on`] drives a single future on the calling thread, and
//! [`block_on_stream`] turns a stream into a blocking iterator.
//!
//! # Example
//!
//! ```
//! use gesit::ThreadPool;
//!
//! let pool = ThreadPool::new().unwrap();
//!
//! let handle = pool.spawn(async { 1 + 1 }).unwrap();
//!
//! assert_eq!(gesit::block_on(handle).unwrap(), 2);
//! ```
//!
//! [`LocalPool`]: struct.LocalPool.html
//! [`ThreadPool`]: struct.ThreadPool.html
//! [`JoinHandle`]: struct.JoinHandle.html
//! [`TaskError`]: struct.TaskError.html
//! [`block_on`]: fn.block_on.html
//! [`block_on_stream`]: fn.block_on_stream.html

mod block_on;
mod enter;
mod local_pool;
mod spawn;
mod task;
mod thread_pool;

pub use block_on::block_on;
pub use block_on::block_on_stream;
pub use block_on::BlockingStream;

pub use enter::enter;
pub use enter::Enter;
pub use enter::EnterError;

pub use local_pool::LocalExecutor;
pub use local_pool::LocalPool;

pub use spawn::spawn;
pub use spawn::spawn_with_handle;
pub use spawn::Executor;
pub use spawn::Spawn;
pub use spawn::SpawnError;
pub use spawn::SpawnWithHandle;

pub use task::JoinHandle;
pub use task::TaskError;

pub use thread_pool::BuildError;
pub use thread_pool::ThreadPool;
pub use thread_pool::ThreadPoolBuilder;
