//! Abstraction over the hosted realtime document store.
//!
//! The session core only ever talks to [`SyncStore`]: subtree subscriptions,
//! field-level last-write-wins mutations, and a server-side disconnect hook.
//! [`memory::MemoryStore`] is the reference implementation used by tests and
//! the demo binary.

pub mod memory;

use std::fmt;

use futures::{future::BoxFuture, stream::BoxStream};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::watch;

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Error raised by store backends.
///
/// There is exactly one class: the transport is down or rejected the call.
/// Callers treat it as non-fatal and converge via the next snapshot instead
/// of retrying.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The backing transport is unreachable or refused the mutation.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A slash-separated document path inside the store's keyspace.
///
/// Segments are appended pre-sanitized; the room segment in particular goes
/// through [`crate::model::validation::sanitize_room_name`] before it gets
/// here.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SyncPath(Vec<String>);

impl SyncPath {
    /// Start a path at a top-level collection.
    pub fn root(segment: impl Into<String>) -> Self {
        Self(vec![segment.into()])
    }

    /// Extend the path by one segment.
    pub fn child(mut self, segment: impl Into<String>) -> Self {
        self.0.push(segment.into());
        self
    }

    /// The path's segments, root first.
    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for SyncPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

/// Contract the session core depends on, modeled after the hosted realtime
/// database's primitives.
///
/// All mutation semantics are last-write-wins at field granularity; the store
/// does not order two independent clients' writes relative to each other, but
/// delivers committed snapshots to each subscriber in commit order, including
/// echoes of the subscriber's own writes.
pub trait SyncStore: Send + Sync {
    /// Stream of full-subtree snapshots at `path`, starting with the current
    /// value and firing on every subsequent change. `None` means the subtree
    /// does not exist.
    fn subscribe(&self, path: SyncPath) -> BoxStream<'static, Option<Value>>;

    /// Replace the subtree at `path`.
    fn write(&self, path: SyncPath, value: Value) -> BoxFuture<'static, StoreResult<()>>;

    /// Shallow-merge `fields` into the object at `path`, leaving siblings
    /// untouched.
    fn merge(&self, path: SyncPath, fields: Map<String, Value>)
    -> BoxFuture<'static, StoreResult<()>>;

    /// Remove the subtree at `path`. Removing a missing subtree is a no-op.
    fn delete(&self, path: SyncPath) -> BoxFuture<'static, StoreResult<()>>;

    /// Transport connectivity, `true` while the store is reachable.
    fn connection_changes(&self) -> watch::Receiver<bool>;

    /// Arm a server-side merge applied by the store itself if this client
    /// disconnects uncleanly, independent of further client participation.
    /// Re-registering for the same path replaces the previous hook.
    fn register_disconnect_merge(
        &self,
        path: SyncPath,
        fields: Map<String, Value>,
    ) -> BoxFuture<'static, StoreResult<()>>;

    /// Disarm the disconnect hook registered at `path`, if any. Used on a
    /// clean leave so a later transport drop does not resurrect fields at a
    /// path the client already deleted.
    fn cancel_disconnect_merge(&self, path: SyncPath) -> BoxFuture<'static, StoreResult<()>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_render_slash_separated() {
        let path = SyncPath::root("rooms").child("sprint_12").child("users");
        assert_eq!(path.to_string(), "rooms/sprint_12/users");
        assert_eq!(path.segments().len(), 3);
    }
}
