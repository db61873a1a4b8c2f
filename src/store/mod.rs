//! Access to the remote realtime data store.
//!
//! The engine needs exactly three operations from the store: a one-shot
//! read, a subscription that reports every change at a path, and the
//! release of such a subscription. [`RemoteStore`] captures that contract.
//!
//! # Adapters
//!
//! - [`memory`]: an in-process realtime tree, for tests and local runs
//! - [`rest`]: a realtime database REST endpoint, with polling listeners

pub mod memory;
pub mod rest;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

pub use memory::MemoryStore;
pub use rest::RestStore;

/// Callback invoked with the value at a subscribed path (`None` when absent).
pub type ChangeListener = Arc<dyn Fn(Option<Value>) + Send + Sync>;

/// Proof of a live subscription, consumed by [`RemoteStore::unsubscribe`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    id: u64,
    path: String,
}

impl SubscriptionHandle {
    pub fn new(id: u64, path: impl Into<String>) -> Self {
        Self {
            id,
            path: path.into(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.id, self.path)
    }
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Read the value at `path` once. `None` when nothing is stored there.
    async fn read_once(&self, path: &str) -> Result<Option<Value>>;

    /// Register `listener` for changes at `path`.
    ///
    /// The listener receives the current value once the registration is
    /// acknowledged, then again on every change at or beneath `path`.
    async fn subscribe(&self, path: &str, listener: ChangeListener) -> Result<SubscriptionHandle>;

    /// Release a subscription. Releasing an already released handle is a no-op.
    async fn unsubscribe(&self, handle: &SubscriptionHandle) -> Result<()>;
}

/// Split a store path into its non-empty segments.
pub(crate) fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}
