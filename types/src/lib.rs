//! Shared value types for the modhub core.
//!
//! This crate defines the types every other crate in the workspace speaks:
//! public keys, protocol events and timestamps.

pub mod error;
pub mod event;
pub mod keys;
pub mod time;

pub use error::TypesError;
pub use event::Event;
pub use keys::PublicKey;
pub use time::Timestamp;
