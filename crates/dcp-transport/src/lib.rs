//! Remote-call transport abstraction (spec component C7).
//!
//! The core makes no assumption about wire framing (spec §1, §4.6); this
//! crate supplies the concrete ambient shape every binding programs against
//! ([`api::CoordinatorApi`]) plus two bindings: [`local::LocalTransport`] for
//! same-process calls and tests, and an HTTP pair
//! ([`client::HttpTransportClient`] / `http_server::router`) for real
//! deployments.

pub mod api;
pub mod client;
pub mod http_server;
pub mod local;

pub use api::{CoordinatorApi, WireError};
pub use client::HttpTransportClient;
pub use local::LocalTransport;
