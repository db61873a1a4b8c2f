//! Building and holding the course roster.
//!
//! A full fetch reads the course's whole namespace in one go, normalizes it,
//! and projects every user record found under the namespace's second
//! top-level node (the first one holds course-wide usage). Records without a
//! nickname are placeholders and are skipped.
//!
//! The resulting roster is published into a [`RosterStore`], the one piece
//! of state shared with live subscriptions. Its only writers are the fetch
//! (wholesale replace), enrollment filtering, and the status channel
//! (`online_status` only).

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, instrument, warn};

use crate::course::{Course, Student};
use crate::error::{MetricsError, Result};
use crate::identity::IdentityService;
use crate::model::{Roster, UserMetric};
use crate::normalize::normalize;
use crate::paths::{course_namespace, sanitize_email, user_path};
use crate::project::{ROOT_ID, project, project_metric};
use crate::store::RemoteStore;

/// Position of the users node among the namespace's top-level nodes.
const USERS_NODE_INDEX: usize = 1;

const NICKNAME_KEY: &str = "nickname";

/// One-shot reads of user activity from the store.
#[derive(Clone)]
pub struct RosterFetcher {
    store: Arc<dyn RemoteStore>,
}

impl RosterFetcher {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    /// Fetch every user of the course, keyed by nickname.
    ///
    /// An empty namespace yields an empty roster. When two records share a
    /// nickname, the later one wins.
    #[instrument(skip_all, fields(course = %course.url))]
    pub async fn fetch_all(&self, course: &Course) -> Result<Roster> {
        let namespace = course_namespace(&course.url);
        let mut roster = Roster::new();

        let Some(raw) = self.store.read_once(namespace).await? else {
            info!(namespace = %namespace, "No activity recorded for course");
            return Ok(roster);
        };

        let root = normalize(ROOT_ID, &raw)?;
        let Some(users) = root.metrics.into_iter().nth(USERS_NODE_INDEX) else {
            info!(namespace = %namespace, "No user records for course");
            return Ok(roster);
        };

        let labs = course.labs();
        let mut skipped = 0;
        for record in users.metrics {
            let nickname = match record.str_field(NICKNAME_KEY) {
                Some(nickname) if !nickname.is_empty() => nickname.to_string(),
                _ => {
                    skipped += 1;
                    continue;
                }
            };

            let user_id = record.id.clone();
            let user = project_metric(&user_id, record, labs);
            if roster.insert(nickname.clone(), user).is_some() {
                warn!(nickname = %nickname, "Duplicate nickname in roster, keeping the later record");
            }
        }

        info!(users = roster.len(), skipped, "Roster fetched");
        Ok(roster)
    }

    /// Fetch a single user by email.
    pub async fn fetch_user(&self, course: &Course, email: &str) -> Result<UserMetric> {
        let path = user_path(course_namespace(&course.url), email);
        debug!(path = %path, "Fetching user");

        let raw = self
            .store
            .read_once(&path)
            .await?
            .ok_or_else(|| MetricsError::UserNotFound(path.clone()))?;

        project(&sanitize_email(email), &raw, course)
    }

    /// Fetch a single user by opaque identifier.
    pub async fn fetch_user_by_id(
        &self,
        course: &Course,
        opaque_id: &str,
        identity: &dyn IdentityService,
    ) -> Result<UserMetric> {
        let email = identity.decrypt(opaque_id)?;
        self.fetch_user(course, &email).await
    }
}

/// Keep only enrolled users, adopting each student's authoritative name.
///
/// Returns the nicknames that were removed.
pub fn filter_users(roster: &mut Roster, students: &[Student]) -> Vec<String> {
    let enrolled: HashMap<&str, &Student> = students
        .iter()
        .map(|student| (student.github.as_str(), student))
        .collect();

    let mut removed = Vec::new();
    roster.retain(|nickname, user| match enrolled.get(nickname.as_str()) {
        Some(student) => {
            user.name = Some(student.name.clone());
            true
        }
        None => {
            removed.push(nickname.clone());
            false
        }
    });
    removed
}

/// Shared handle on the live roster.
#[derive(Clone, Default)]
pub struct RosterStore {
    inner: Arc<RwLock<Roster>>,
}

impl RosterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole roster.
    pub fn replace(&self, roster: Roster) {
        *self.write() = roster;
    }

    pub fn get(&self, nickname: &str) -> Option<UserMetric> {
        self.read().get(nickname).cloned()
    }

    pub fn snapshot(&self) -> Roster {
        self.read().clone()
    }

    pub fn nicknames(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Update one user's online status. Returns `false` when the user is not in the roster.
    pub fn set_online_status(&self, nickname: &str, status: Option<String>) -> bool {
        match self.write().get_mut(nickname) {
            Some(user) => {
                user.online_status = status;
                true
            }
            None => false,
        }
    }

    /// Apply [`filter_users`] in place. Returns the removed nicknames.
    pub fn retain_enrolled(&self, students: &[Student]) -> Vec<String> {
        filter_users(&mut self.write(), students)
    }

    fn read(&self) -> RwLockReadGuard<'_, Roster> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Roster> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}
