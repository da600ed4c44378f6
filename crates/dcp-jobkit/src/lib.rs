//! Reference implementation of the opaque "user-supplied code" capability
//! sandbox (spec §3, §9). A real deployment would back `Job`/`TaskExecutor`
//! with a WASM host, subprocess protocol, or dynamic-library ABI; this crate
//! backs them with a small name-keyed [`factory::JobFactory`] registry and a
//! JSON [`descriptor::JobDescriptor`] in place of bytecode, plus the
//! reference "counter job" the spec's end-to-end scenarios are built around.

pub mod class_loader;
pub mod counter;
pub mod descriptor;
pub mod factory;
pub mod worker_loader;

pub use class_loader::ServerClassLoader;
pub use counter::{CounterExecutor, CounterFactory, CounterJob, CounterParams};
pub use descriptor::JobDescriptor;
pub use factory::{FactoryRegistry, JobFactory};
pub use worker_loader::WorkerExecutorLoader;
