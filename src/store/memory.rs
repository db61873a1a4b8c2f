//! In-process realtime store.
//!
//! Holds a single JSON tree and behaves like a realtime database's "value"
//! listeners: a listener gets the current value on registration and again
//! whenever a write lands at, above, or beneath its path.
//!
//! Listeners are invoked after the internal lock is released, so a listener
//! may call back into the store.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use super::{ChangeListener, RemoteStore, SubscriptionHandle, segments};
use crate::error::{MetricsError, Result};

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    root: Value,
    listeners: HashMap<u64, Registration>,
    next_id: u64,
    rejected_prefixes: HashSet<String>,
}

struct Registration {
    path: Vec<String>,
    listener: ChangeListener,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `root`.
    pub fn with_data(root: Value) -> Self {
        let store = Self::new();
        store.state().root = root;
        store
    }

    /// Write `value` at `path` and notify affected listeners.
    ///
    /// Writing `null` deletes the subtree; emptied parents are pruned.
    pub fn set(&self, path: &str, value: Value) {
        let written: Vec<String> = segments(path).map(str::to_string).collect();

        let notifications: Vec<(ChangeListener, Option<Value>)> = {
            let mut state = self.state();
            write(&mut state.root, &written, value);

            state
                .listeners
                .values()
                .filter(|r| is_prefix(&r.path, &written) || is_prefix(&written, &r.path))
                .map(|r| (r.listener.clone(), lookup(&state.root, &r.path).cloned()))
                .collect()
        };

        debug!(path = %path, listeners = notifications.len(), "Store write");
        for (listener, value) in notifications {
            listener(value);
        }
    }

    /// Make every subscription at or beneath `prefix` fail.
    pub fn reject_subscriptions_under(&self, prefix: &str) {
        self.state()
            .rejected_prefixes
            .insert(segments(prefix).collect::<Vec<_>>().join("/"));
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.state().listeners.len()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn read_once(&self, path: &str) -> Result<Option<Value>> {
        let path: Vec<String> = segments(path).map(str::to_string).collect();
        Ok(lookup(&self.state().root, &path).cloned())
    }

    async fn subscribe(&self, path: &str, listener: ChangeListener) -> Result<SubscriptionHandle> {
        let parts: Vec<String> = segments(path).map(str::to_string).collect();

        let (handle, current) = {
            let mut state = self.state();

            let rejected = state.rejected_prefixes.iter().any(|prefix| {
                let prefix: Vec<String> = segments(prefix).map(str::to_string).collect();
                is_prefix(&prefix, &parts)
            });
            if rejected {
                return Err(MetricsError::Channel {
                    path: path.to_string(),
                    reason: "subscription rejected by store".to_string(),
                });
            }

            state.next_id += 1;
            let id = state.next_id;
            let current = lookup(&state.root, &parts).cloned();
            state.listeners.insert(
                id,
                Registration {
                    path: parts,
                    listener: listener.clone(),
                },
            );
            (SubscriptionHandle::new(id, path), current)
        };

        listener(current);
        Ok(handle)
    }

    async fn unsubscribe(&self, handle: &SubscriptionHandle) -> Result<()> {
        self.state().listeners.remove(&handle.id());
        Ok(())
    }
}

fn is_prefix(prefix: &[String], path: &[String]) -> bool {
    prefix.len() <= path.len() && prefix.iter().zip(path).all(|(a, b)| a == b)
}

/// Value at `path`, treating `null` as absent.
fn lookup<'a>(root: &'a Value, path: &[String]) -> Option<&'a Value> {
    let mut node = root;
    for segment in path {
        node = node.as_object()?.get(segment)?;
    }
    (!node.is_null()).then_some(node)
}

fn write(node: &mut Value, path: &[String], value: Value) {
    let Some((head, rest)) = path.split_first() else {
        *node = value;
        return;
    };

    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    let Value::Object(map) = node else {
        return;
    };

    let child = map.entry(head.clone()).or_insert(Value::Null);
    write(child, rest, value);

    let emptied = child.is_null() || child.as_object().is_some_and(Map::is_empty);
    if emptied {
        map.shift_remove(head);
    }
}
