//! Nullable infrastructure for deterministic testing.
//!
//! Every external dependency of the hub (the follow graph, the HTTP
//! transport, the settings store) sits behind a trait. This crate provides
//! test implementations that:
//! - Return scripted, deterministic results
//! - Record every call for assertions
//! - Never touch the filesystem or network
//!
//! Delays are plain `tokio::time::sleep`s, so tests running with a paused
//! clock control them precisely.

pub mod graph;
pub mod store;
pub mod transport;

pub use graph::NullGraph;
pub use store::NullStore;
pub use transport::{Method, NullTransport, RecordedCall};
