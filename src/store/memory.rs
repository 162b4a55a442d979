//! In-memory [`SyncStore`] used by tests and the demo binary.
//!
//! A single mutexed JSON document plays the hosted store's role; a `watch`
//! version counter fans out change notifications to subscribers. Disconnects
//! are simulated with [`MemoryStore::set_connected`], which makes mutations
//! fail and fires any armed disconnect hooks, mirroring the server-side
//! behavior of the real service.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use futures::{StreamExt, future::BoxFuture, stream::BoxStream};
use serde_json::{Map, Value};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use super::{StoreError, StoreResult, SyncPath, SyncStore};

/// Shared in-memory document store.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

struct Inner {
    root: Mutex<Value>,
    version: watch::Sender<u64>,
    connected: watch::Sender<bool>,
    hooks: DashMap<SyncPath, Map<String, Value>>,
}

impl MemoryStore {
    /// Create an empty, connected store.
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        let (connected, _) = watch::channel(true);
        Self {
            inner: Arc::new(Inner {
                root: Mutex::new(Value::Object(Map::new())),
                version,
                connected,
                hooks: DashMap::new(),
            }),
        }
    }

    /// Flip simulated transport connectivity.
    ///
    /// Going down fires every armed disconnect hook exactly once, the way the
    /// hosted store applies them server-side when a client vanishes.
    pub fn set_connected(&self, up: bool) {
        if *self.inner.connected.borrow() == up {
            return;
        }
        self.inner.connected.send_replace(up);
        if !up {
            self.inner.fire_disconnect_hooks();
        }
    }

    /// Clone of the whole document, for tests and debugging.
    pub fn snapshot(&self) -> Value {
        self.inner.lock_root().clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    fn lock_root(&self) -> MutexGuard<'_, Value> {
        self.root.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_connected(&self) -> StoreResult<()> {
        if *self.connected.borrow() {
            Ok(())
        } else {
            Err(StoreError::Unavailable("transport is down".into()))
        }
    }

    fn bump(&self) {
        self.version.send_modify(|v| *v = v.wrapping_add(1));
    }

    fn read_subtree(&self, path: &SyncPath) -> Option<Value> {
        let root = self.lock_root();
        let mut node: &Value = &root;
        for segment in path.segments() {
            node = node.get(segment)?;
        }
        if node.is_null() { None } else { Some(node.clone()) }
    }

    fn fire_disconnect_hooks(&self) {
        let armed: Vec<(SyncPath, Map<String, Value>)> = self
            .hooks
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        self.hooks.clear();
        if armed.is_empty() {
            return;
        }
        {
            let mut root = self.lock_root();
            for (path, fields) in armed {
                merge_at(&mut root, &path, fields);
            }
        }
        self.bump();
    }
}

/// Descend to the object named by `segments`, materializing intermediate
/// objects along the way.
fn object_at<'a>(root: &'a mut Value, segments: &[String]) -> &'a mut Map<String, Value> {
    let mut node = root;
    for segment in segments {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        node = match node {
            Value::Object(map) => map
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new())),
            _ => unreachable!("node was just materialized as an object"),
        };
    }
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just materialized as an object"),
    }
}

fn merge_at(root: &mut Value, path: &SyncPath, fields: Map<String, Value>) {
    let target = object_at(root, path.segments());
    for (key, value) in fields {
        // Null clears a field, matching the hosted store's semantics.
        if value.is_null() {
            target.remove(&key);
        } else {
            target.insert(key, value);
        }
    }
}

fn write_at(root: &mut Value, path: &SyncPath, value: Value) {
    let Some((last, front)) = path.segments().split_last() else {
        *root = value;
        return;
    };
    let parent = object_at(root, front);
    if value.is_null() {
        parent.remove(last);
    } else {
        parent.insert(last.clone(), value);
    }
}

/// Remove the subtree at `path`; missing intermediates make this a no-op.
fn delete_at(root: &mut Value, path: &SyncPath) -> bool {
    let Some((last, front)) = path.segments().split_last() else {
        *root = Value::Object(Map::new());
        return true;
    };
    let mut node: &mut Value = root;
    for segment in front {
        match node.get_mut(segment) {
            Some(next) => node = next,
            None => return false,
        }
    }
    match node.as_object_mut() {
        Some(map) => map.remove(last).is_some(),
        None => false,
    }
}

impl SyncStore for MemoryStore {
    fn subscribe(&self, path: SyncPath) -> BoxStream<'static, Option<Value>> {
        let receiver = self.inner.version.subscribe();
        let inner = self.inner.clone();
        WatchStream::new(receiver)
            .map(move |_| inner.read_subtree(&path))
            .boxed()
    }

    fn write(&self, path: SyncPath, value: Value) -> BoxFuture<'static, StoreResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.ensure_connected()?;
            {
                let mut root = inner.lock_root();
                write_at(&mut root, &path, value);
            }
            inner.bump();
            Ok(())
        })
    }

    fn merge(
        &self,
        path: SyncPath,
        fields: Map<String, Value>,
    ) -> BoxFuture<'static, StoreResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.ensure_connected()?;
            {
                let mut root = inner.lock_root();
                merge_at(&mut root, &path, fields);
            }
            inner.bump();
            Ok(())
        })
    }

    fn delete(&self, path: SyncPath) -> BoxFuture<'static, StoreResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.ensure_connected()?;
            let removed = {
                let mut root = inner.lock_root();
                delete_at(&mut root, &path)
            };
            if removed {
                inner.bump();
            }
            Ok(())
        })
    }

    fn connection_changes(&self) -> watch::Receiver<bool> {
        self.inner.connected.subscribe()
    }

    fn register_disconnect_merge(
        &self,
        path: SyncPath,
        fields: Map<String, Value>,
    ) -> BoxFuture<'static, StoreResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.ensure_connected()?;
            inner.hooks.insert(path, fields);
            Ok(())
        })
    }

    fn cancel_disconnect_merge(&self, path: SyncPath) -> BoxFuture<'static, StoreResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.ensure_connected()?;
            inner.hooks.remove(&path);
            Ok(())
        })
    }
}
