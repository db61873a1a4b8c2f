//! Live channels keeping the roster in sync with the store.
//!
//! Each roster user gets three kinds of channel:
//!
//! - **status**: the user's root path; every change refreshes the user's
//!   `online_status` in the roster and nothing else
//! - **lab**: one per course lab; every change notifies the lab callback
//! - **topic**: one per course topic; a change notifies the topic callback
//!   only when the payload carries a `title`
//!
//! Every handle returned by the store is kept in a per-user set, so closing
//! releases exactly what was opened without rebuilding paths. Users are set
//! up independently: a failing channel is reported and the remaining
//! channels and users proceed.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::course::Course;
use crate::error::MetricsError;
use crate::model::{TITLE_KEY, UserMetric};
use crate::normalize::normalize;
use crate::paths::{course_namespace, lab_path, topic_path, user_path};
use crate::project::ROOT_ID;
use crate::roster::RosterStore;
use crate::store::{ChangeListener, RemoteStore, SubscriptionHandle};

/// Callback notified with the affected user and the lab or topic title.
pub type MetricUpdate = Arc<dyn Fn(&UserMetric, &str) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Status,
    Lab,
    Topic,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ChannelKind::Status => "status",
            ChannelKind::Lab => "lab",
            ChannelKind::Topic => "topic",
        };
        f.write_str(label)
    }
}

/// A channel that could not be opened or closed.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelFailure {
    pub nickname: String,
    pub kind: ChannelKind,
    pub message: String,
}

/// Outcome of opening channels for a roster.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OpenReport {
    pub users: usize,
    pub channels_opened: usize,
    pub failures: Vec<ChannelFailure>,
}

/// Handles held for one user.
#[derive(Default)]
struct UserChannels {
    handles: Vec<(ChannelKind, SubscriptionHandle)>,
}

/// Everything a channel needs while a roster is being wired up.
struct Wiring<'a> {
    namespace: &'a str,
    course: &'a Course,
    lab_update: &'a MetricUpdate,
    topic_update: &'a MetricUpdate,
}

pub struct SubscriptionManager {
    store: Arc<dyn RemoteStore>,
    roster: RosterStore,
    channels: Mutex<HashMap<String, UserChannels>>,
}

impl SubscriptionManager {
    pub fn new(store: Arc<dyn RemoteStore>, roster: RosterStore) -> Self {
        Self {
            store,
            roster,
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Open status, lab and topic channels for every user in the roster.
    pub async fn open(
        &self,
        course: &Course,
        lab_update: MetricUpdate,
        topic_update: MetricUpdate,
    ) -> OpenReport {
        let wiring = Wiring {
            namespace: course_namespace(&course.url),
            course,
            lab_update: &lab_update,
            topic_update: &topic_update,
        };

        let mut report = OpenReport::default();
        let mut channels = self.channels.lock().await;

        for (nickname, user) in self.roster.snapshot() {
            if let Some(previous) = channels.remove(&nickname) {
                self.release(&nickname, previous, &mut report.failures).await;
            }

            let opened = self.open_user(&wiring, &nickname, &user, &mut report.failures).await;
            report.users += 1;
            report.channels_opened += opened.handles.len();
            channels.insert(nickname, opened);
        }

        info!(
            users = report.users,
            channels = report.channels_opened,
            failures = report.failures.len(),
            "Channels opened"
        );
        report
    }

    /// Close every open channel. Returns the channels the store failed to release.
    pub async fn close_all(&self) -> Vec<ChannelFailure> {
        let drained: Vec<_> = self.channels.lock().await.drain().collect();
        let mut failures = Vec::new();
        let users = drained.len();

        for (nickname, channels) in drained {
            self.release(&nickname, channels, &mut failures).await;
        }

        info!(users, failures = failures.len(), "Channels closed");
        failures
    }

    /// Close the channels of the given users. Unknown users are ignored.
    pub async fn close_users(&self, nicknames: &[String]) -> Vec<ChannelFailure> {
        let mut channels = self.channels.lock().await;
        let mut failures = Vec::new();

        for nickname in nicknames {
            if let Some(user_channels) = channels.remove(nickname) {
                self.release(nickname, user_channels, &mut failures).await;
            }
        }
        failures
    }

    /// Number of channels currently held.
    pub async fn active_channels(&self) -> usize {
        self.channels
            .lock()
            .await
            .values()
            .map(|c| c.handles.len())
            .sum()
    }

    async fn open_user(
        &self,
        wiring: &Wiring<'_>,
        nickname: &str,
        user: &UserMetric,
        failures: &mut Vec<ChannelFailure>,
    ) -> UserChannels {
        let mut opened = UserChannels::default();

        let Some(email) = user.email.as_deref() else {
            warn!(nickname = %nickname, "User has no email, no channels opened");
            failures.push(ChannelFailure {
                nickname: nickname.to_string(),
                kind: ChannelKind::Status,
                message: "user record has no email".to_string(),
            });
            return opened;
        };

        let mut attempts: Vec<(ChannelKind, Result<String, MetricsError>, ChangeListener)> = Vec::new();

        attempts.push((
            ChannelKind::Status,
            Ok(user_path(wiring.namespace, email)),
            status_listener(self.roster.clone()),
        ));

        for lab in wiring.course.labs() {
            let path = lab_path(wiring.namespace, email, &lab.route).ok_or_else(|| {
                MetricsError::Course(format!("lab '{}' route has no topic segment", lab.title))
            });
            let listener = lab_listener(
                self.roster.clone(),
                user.clone(),
                lab.title.clone(),
                wiring.lab_update.clone(),
            );
            attempts.push((ChannelKind::Lab, path, listener));
        }

        for topic in &wiring.course.topics {
            let listener = topic_listener(
                self.roster.clone(),
                user.clone(),
                topic.lo.title.clone(),
                wiring.topic_update.clone(),
            );
            attempts.push((
                ChannelKind::Topic,
                Ok(topic_path(wiring.namespace, email, &topic.lo.id)),
                listener,
            ));
        }

        for (kind, path, listener) in attempts {
            let result = match path {
                Ok(path) => self.store.subscribe(&path, listener).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(handle) => {
                    debug!(nickname = %nickname, kind = %kind, handle = %handle, "Channel opened");
                    opened.handles.push((kind, handle));
                }
                Err(e) => {
                    warn!(nickname = %nickname, kind = %kind, error = %e, "Failed to open channel");
                    failures.push(ChannelFailure {
                        nickname: nickname.to_string(),
                        kind,
                        message: e.to_string(),
                    });
                }
            }
        }

        opened
    }

    async fn release(
        &self,
        nickname: &str,
        channels: UserChannels,
        failures: &mut Vec<ChannelFailure>,
    ) {
        for (kind, handle) in channels.handles {
            match self.store.unsubscribe(&handle).await {
                Ok(()) => debug!(nickname = %nickname, kind = %kind, handle = %handle, "Channel closed"),
                Err(e) => {
                    warn!(nickname = %nickname, kind = %kind, error = %e, "Failed to close channel");
                    failures.push(ChannelFailure {
                        nickname: nickname.to_string(),
                        kind,
                        message: e.to_string(),
                    });
                }
            }
        }
    }
}

/// Refresh `online_status` of the user named in the payload.
fn status_listener(roster: RosterStore) -> ChangeListener {
    Arc::new(move |value: Option<Value>| {
        let Some(value) = value else {
            return;
        };
        let update = match normalize(ROOT_ID, &value) {
            Ok(update) => update,
            Err(e) => {
                debug!(error = %e, "Ignoring status payload");
                return;
            }
        };
        let Some(nickname) = update.str_field("nickname") else {
            return;
        };

        let status = update.str_field("onlineStatus").map(str::to_string);
        if !roster.set_online_status(nickname, status) {
            debug!(nickname = %nickname, "Status update for user outside roster");
        }
    })
}

/// Notify `lab_update` on every change, whatever the payload.
fn lab_listener(
    roster: RosterStore,
    user: UserMetric,
    title: String,
    lab_update: MetricUpdate,
) -> ChangeListener {
    Arc::new(move |_: Option<Value>| {
        let current = current_user(&roster, &user);
        lab_update(&current, &title);
    })
}

/// Notify `topic_update` when the payload carries a title.
fn topic_listener(
    roster: RosterStore,
    user: UserMetric,
    title: String,
    topic_update: MetricUpdate,
) -> ChangeListener {
    Arc::new(move |value: Option<Value>| {
        let titled = value
            .as_ref()
            .and_then(|v| v.get(TITLE_KEY))
            .is_some_and(|t| !t.is_null());
        if titled {
            let current = current_user(&roster, &user);
            topic_update(&current, &title);
        }
    })
}

/// The roster's latest copy of `user`, or `user` itself once it left the roster.
fn current_user(roster: &RosterStore, user: &UserMetric) -> UserMetric {
    user.nickname
        .as_deref()
        .and_then(|nickname| roster.get(nickname))
        .unwrap_or_else(|| user.clone())
}
