//! Job Registry, Status Event Log and Job Coordinator (spec components
//! C3/C4/C5).

pub mod checkpoint;
pub mod coordinator;
pub mod event_log;
pub mod finalize;
pub mod job;

pub use checkpoint::JobCheckpoint;
pub use coordinator::Coordinator;
pub use event_log::StatusEventLog;
pub use job::{ClassLoader, ScheduledJob};
