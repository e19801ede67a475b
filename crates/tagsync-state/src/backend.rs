//! State backend trait definition.
//!
//! [`StateBackend`] is a flat key-value store. Keys are derived by the
//! engine from a query identity plus a purpose suffix, for example
//! `<identity>_sync_marker` or `refresh_<identity>_sync_session`.

use crate::error;

/// Storage contract for sync cursors, delivered-id sets and sessions.
///
/// Implementations must be `Send + Sync` for use behind `Arc<dyn StateBackend>`.
/// A key holds either a string or an integer, never both.
pub trait StateBackend: Send + Sync {
    /// Read a string value. Returns `Ok(None)` when the key is absent.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn get_string(&self, key: &str) -> error::Result<Option<String>>;

    /// Upsert a string value.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn put_string(&self, key: &str, value: &str) -> error::Result<()>;

    /// Read an integer value. Returns `Ok(None)` when the key is absent.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn get_i64(&self, key: &str) -> error::Result<Option<i64>>;

    /// Upsert an integer value.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn put_i64(&self, key: &str, value: i64) -> error::Result<()>;

    /// Delete a key. Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn remove(&self, key: &str) -> error::Result<()>;
}
