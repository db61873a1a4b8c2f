//! The metrics service: roster fetching plus live channels for one course.
//!
//! # Lifecycle
//!
//! `start` fetches the full roster, publishes it, then opens every user's
//! channels. `stop` releases every channel and clears the roster. Starting
//! a running service stops it first, so listeners are never duplicated.
//!
//! # Shared state
//!
//! The roster is the only mutable state shared with channel listeners. It
//! lives in a [`RosterStore`] handed to the channels by handle; see
//! [`crate::roster`] for who writes it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::course::{Course, Student};
use crate::error::Result;
use crate::identity::IdentityService;
use crate::model::{Roster, UserMetric};
use crate::roster::{RosterFetcher, RosterStore};
use crate::store::RemoteStore;
use crate::subscriptions::{ChannelFailure, MetricUpdate, SubscriptionManager};

/// Outcome of [`MetricsService::start`].
#[derive(Debug, Clone, Serialize)]
pub struct StartReport {
    pub started_at: DateTime<Utc>,
    pub users: usize,
    pub channels_opened: usize,
    /// Channels that could not be opened; the rest are live.
    pub failures: Vec<ChannelFailure>,
}

pub struct MetricsService {
    fetcher: RosterFetcher,
    roster: RosterStore,
    subscriptions: SubscriptionManager,
}

impl MetricsService {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        let roster = RosterStore::new();
        Self {
            fetcher: RosterFetcher::new(store.clone()),
            subscriptions: SubscriptionManager::new(store, roster.clone()),
            roster,
        }
    }

    /// The live roster.
    pub fn roster(&self) -> &RosterStore {
        &self.roster
    }

    /// Fetch the roster and open channels for every user.
    ///
    /// Fails only when the roster cannot be fetched. Channel failures are
    /// reported in the returned [`StartReport`].
    #[instrument(skip_all, fields(course = %course.url))]
    pub async fn start(
        &self,
        course: &Course,
        lab_update: MetricUpdate,
        topic_update: MetricUpdate,
    ) -> Result<StartReport> {
        let leftover = self.subscriptions.active_channels().await;
        if leftover > 0 {
            info!(channels = leftover, "Service already running, restarting");
            self.stop().await;
        }

        self.fetch_all(course).await?;
        let opened = self.subscriptions.open(course, lab_update, topic_update).await;

        if !opened.failures.is_empty() {
            warn!(failures = opened.failures.len(), "Some channels could not be opened");
        }

        Ok(StartReport {
            started_at: Utc::now(),
            users: opened.users,
            channels_opened: opened.channels_opened,
            failures: opened.failures,
        })
    }

    /// Release every channel and clear the roster.
    ///
    /// Returns the channels the store failed to release. They are dropped
    /// from the service either way.
    #[instrument(skip_all)]
    pub async fn stop(&self) -> Vec<ChannelFailure> {
        let failures = self.subscriptions.close_all().await;
        self.roster.replace(Roster::new());
        info!(failures = failures.len(), "Metrics service stopped");
        failures
    }

    /// Fetch the full roster and publish it.
    pub async fn fetch_all(&self, course: &Course) -> Result<Roster> {
        let roster = self.fetcher.fetch_all(course).await?;
        self.roster.replace(roster.clone());
        Ok(roster)
    }

    /// Fetch a single user by email. The roster is left untouched.
    pub async fn fetch_user(&self, course: &Course, email: &str) -> Result<UserMetric> {
        self.fetcher.fetch_user(course, email).await
    }

    /// Fetch a single user by opaque identifier. The roster is left untouched.
    pub async fn fetch_user_by_id(
        &self,
        course: &Course,
        opaque_id: &str,
        identity: &dyn IdentityService,
    ) -> Result<UserMetric> {
        self.fetcher
            .fetch_user_by_id(course, opaque_id, identity)
            .await
    }

    /// Drop users who are not enrolled and close their channels.
    ///
    /// Remaining users take their enrolled name. Returns the removed nicknames.
    #[instrument(skip_all, fields(students = students.len()))]
    pub async fn restrict_to_enrolled(&self, students: &[Student]) -> Vec<String> {
        let removed = self.roster.retain_enrolled(students);
        let failures = self.subscriptions.close_users(&removed).await;

        info!(
            removed = removed.len(),
            remaining = self.roster.len(),
            close_failures = failures.len(),
            "Roster restricted to enrolled students"
        );
        removed
    }

    pub async fn active_channels(&self) -> usize {
        self.subscriptions.active_channels().await
    }
}
