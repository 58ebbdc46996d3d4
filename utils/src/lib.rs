//! Shared utilities for the modhub workspace.

pub mod backoff;
pub mod cancel;
pub mod logging;
pub mod time;

pub use backoff::Backoff;
pub use cancel::{CancelReason, CancellationToken};
pub use logging::{init_logging, LogFormat};
pub use time::format_duration;
