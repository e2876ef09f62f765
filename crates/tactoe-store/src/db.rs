//! The store interface.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use crate::StoreError;

/// Identifier of one stream entry.
///
/// Ids are handed out from a single store-wide counter, so within a
/// stream they strictly increase in append order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId(pub u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An expiring key/value store with string, set, and stream values.
///
/// Modeled on the small slice of a Redis-like server that the room layer
/// needs. Every method is atomic with respect to the others.
///
/// # Trait bounds
///
/// `Send + Sync + 'static`: one store is shared by every connection task
/// and every room stream for the lifetime of the server. The returned
/// futures are `Send` so callers can `tokio::spawn` them.
pub trait MemDb: Send + Sync + 'static {
    /// Reads a string value.
    fn get(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<String>, StoreError>> + Send;

    /// Sets a string value with a TTL, only if the key is absent.
    /// Returns `false` when the key already existed.
    fn set_nx(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Resets the TTL of any kind of key. Returns `false` when the key
    /// does not exist; that is not an error.
    fn expire(
        &self,
        key: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Deletes a key of any kind. Deleting a missing key is fine.
    fn del(&self, key: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Adds a member to a set, creating it. Returns `false` if the member
    /// was already present.
    fn sadd(
        &self,
        key: &str,
        member: &str,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Removes a member from a set. Returns `false` if it wasn't there.
    /// A set left empty is deleted.
    fn srem(
        &self,
        key: &str,
        member: &str,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// All members of a set, sorted. Empty when the set is absent.
    fn smembers(&self, key: &str)
    -> impl Future<Output = Result<Vec<String>, StoreError>> + Send;

    fn sismember(
        &self,
        key: &str,
        member: &str,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Appends a one-field entry to a stream, creating the stream.
    fn xadd(
        &self,
        key: &str,
        field: &str,
        value: &str,
    ) -> impl Future<Output = Result<EntryId, StoreError>> + Send;

    /// Appends only if the stream's last entry is still `expected_last`.
    ///
    /// # Errors
    /// [`StoreError::Conflict`] when another entry was appended since (or
    /// the stream is gone).
    fn xadd_after(
        &self,
        key: &str,
        expected_last: EntryId,
        field: &str,
        value: &str,
    ) -> impl Future<Output = Result<EntryId, StoreError>> + Send;

    /// The newest entry's `field`.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] when the stream is absent or empty, or the
    /// entry lacks `field`.
    fn xlast(
        &self,
        key: &str,
        field: &str,
    ) -> impl Future<Output = Result<(EntryId, String), StoreError>> + Send;

    /// The first entry newer than `after`, waiting up to `block` for one
    /// to be appended.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] when nothing arrived in time or the stream
    /// doesn't exist.
    fn xread_after(
        &self,
        key: &str,
        field: &str,
        after: EntryId,
        block: Duration,
    ) -> impl Future<Output = Result<(EntryId, String), StoreError>> + Send;

    /// Drops every expired key. Returns how many were dropped.
    fn purge_expired(&self) -> impl Future<Output = Result<usize, StoreError>> + Send;
}
