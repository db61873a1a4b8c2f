//! Realtime database REST client.
//!
//! Reads map to `GET <base>/<path>.json`, where a `null` body means nothing
//! is stored at the path. The REST surface has no push channel, so each
//! subscription runs a polling task that reports the initial value and then
//! every observed change. Releasing the subscription aborts its task.
//!
//! # API Reference
//!
//! See: <https://firebase.google.com/docs/reference/rest/database>

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use super::{ChangeListener, RemoteStore, SubscriptionHandle, segments};
use crate::error::{MetricsError, Result};

/// Default interval between polls of a subscribed path.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

pub struct RestStore {
    client: reqwest::Client,
    base_url: String,
    auth: Option<String>,
    poll_interval: Duration,
    next_id: AtomicU64,
    pollers: Mutex<HashMap<u64, JoinHandle<()>>>,
}

impl RestStore {
    /// Create a client for the database at `base_url`
    /// (e.g. `https://my-course.firebaseio.com`).
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            auth: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            next_id: AtomicU64::new(1),
            pollers: Mutex::new(HashMap::new()),
        }
    }

    /// Authenticate every request with `token`.
    pub fn with_auth(mut self, token: impl Into<String>) -> Self {
        self.auth = Some(token.into());
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Build the REST URL for a store path.
    pub fn url_for(&self, path: &str) -> String {
        let encoded: Vec<_> = segments(path).map(urlencoding::encode).collect();
        let mut url = format!("{}/{}.json", self.base_url, encoded.join("/"));
        if let Some(token) = &self.auth {
            url.push_str("?auth=");
            url.push_str(&urlencoding::encode(token));
        }
        url
    }

    /// Number of running subscription pollers.
    pub fn active_pollers(&self) -> usize {
        self.pollers().len()
    }

    fn pollers(&self) -> MutexGuard<'_, HashMap<u64, JoinHandle<()>>> {
        self.pollers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for RestStore {
    fn drop(&mut self) {
        for (_, task) in self.pollers().drain() {
            task.abort();
        }
    }
}

#[async_trait]
impl RemoteStore for RestStore {
    async fn read_once(&self, path: &str) -> Result<Option<Value>> {
        fetch(&self.client, &self.url_for(path))
            .await
            .map_err(|reason| MetricsError::Read {
                path: path.to_string(),
                reason,
            })
    }

    async fn subscribe(&self, path: &str, listener: ChangeListener) -> Result<SubscriptionHandle> {
        let url = self.url_for(path);
        let initial = fetch(&self.client, &url)
            .await
            .map_err(|reason| MetricsError::Channel {
                path: path.to_string(),
                reason,
            })?;

        listener(initial.clone());

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let client = self.client.clone();
        let interval = self.poll_interval;
        let watched = path.to_string();

        let task = tokio::spawn(async move {
            let mut last = initial;
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; the initial value is already delivered.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                match fetch(&client, &url).await {
                    Ok(current) if current != last => {
                        debug!(path = %watched, "Change observed");
                        listener(current.clone());
                        last = current;
                    }
                    Ok(_) => {}
                    Err(reason) => warn!(path = %watched, error = %reason, "Poll failed"),
                }
            }
        });

        self.pollers().insert(id, task);
        Ok(SubscriptionHandle::new(id, path))
    }

    async fn unsubscribe(&self, handle: &SubscriptionHandle) -> Result<()> {
        if let Some(task) = self.pollers().remove(&handle.id()) {
            task.abort();
        }
        Ok(())
    }
}

async fn fetch(client: &reqwest::Client, url: &str) -> std::result::Result<Option<Value>, String> {
    let response = client
        .get(url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|e| e.to_string())?;

    let value = response.json::<Value>().await.map_err(|e| e.to_string())?;
    Ok((!value.is_null()).then_some(value))
}
