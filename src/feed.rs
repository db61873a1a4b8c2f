//! Recent lab and topic activity, as reported by live channels.
//!
//! The feed is a bounded log: once full, the oldest update is dropped for
//! each new one. [`ActivityFeed::callback`] builds the update callbacks the
//! service passes to its channels.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::model::UserMetric;
use crate::subscriptions::MetricUpdate;

/// Default number of updates kept.
pub const DEFAULT_FEED_CAPACITY: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateKind {
    Lab,
    Topic,
}

/// One notification delivered by a lab or topic channel.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityUpdate {
    /// When the notification arrived (UTC).
    pub timestamp: DateTime<Utc>,
    pub kind: UpdateKind,
    pub nickname: String,
    /// Title of the lab or topic that changed.
    pub title: String,
    /// The user's online status at the time of the update.
    pub online_status: Option<String>,
}

#[derive(Clone)]
pub struct ActivityFeed {
    updates: Arc<Mutex<VecDeque<ActivityUpdate>>>,
    capacity: usize,
}

impl Default for ActivityFeed {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}

impl ActivityFeed {
    /// Create a feed keeping at most `capacity` updates (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            updates: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    pub fn record(&self, kind: UpdateKind, user: &UserMetric, title: &str) {
        let update = ActivityUpdate {
            timestamp: Utc::now(),
            kind,
            nickname: user.nickname.clone().unwrap_or_default(),
            title: title.to_string(),
            online_status: user.online_status.clone(),
        };

        let mut updates = self.updates();
        if updates.len() == self.capacity {
            updates.pop_front();
        }
        updates.push_back(update);
    }

    /// Up to `limit` updates, newest first.
    pub fn recent(&self, limit: usize) -> Vec<ActivityUpdate> {
        self.updates().iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.updates().len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates().is_empty()
    }

    /// A channel callback that logs each update and records it in this feed.
    pub fn callback(&self, kind: UpdateKind) -> MetricUpdate {
        let feed = self.clone();
        Arc::new(move |user: &UserMetric, title: &str| {
            info!(
                kind = ?kind,
                nickname = user.nickname.as_deref().unwrap_or_default(),
                title = %title,
                "Activity update"
            );
            feed.record(kind, user, title);
        })
    }

    fn updates(&self) -> MutexGuard<'_, VecDeque<ActivityUpdate>> {
        self.updates.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
