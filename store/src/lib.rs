//! Persistent key-value storage for client settings.
//!
//! The session persists a handful of small string values (such as the
//! configured aggregation server URL). Every backend implements
//! [`KeyValueStore`]; the rest of the codebase depends only on the trait.

pub mod error;
pub mod file;

pub use error::StoreError;
pub use file::JsonFileStore;

/// A string-to-string store that survives process restarts.
///
/// Values are opaque to the store; callers choose their own encoding.
/// Implementations must be safe to share between tasks.
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` if the key was never written or was removed.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove a key. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}
