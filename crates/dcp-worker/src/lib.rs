//! Worker Runtime (spec component C6): a cooperative multi-threaded client
//! that continually requests tasks, caches artifact definitions by digest,
//! detects server-cancelled tasks, and reconnects across transport
//! failures.

pub mod api;
pub mod class_cache;
pub mod context;
pub mod executor_cache;
pub mod finished_poller;
pub mod idle;
pub mod loader;
pub mod reconnect;
pub mod runtime;
pub mod sink;
pub mod worker_task;

pub use api::WorkerEvent;
pub use class_cache::ClassCache;
pub use executor_cache::ExecutorCache;
pub use finished_poller::ActiveSet;
pub use idle::IdleCoordinator;
pub use loader::ExecutorLoader;
pub use reconnect::{Authenticator, NoopAuthenticator, ReconnectAdapter};
pub use runtime::{start_worker, start_worker_with_authenticator, WorkerHandle};
pub use sink::WorkerCancelSink;
