//! HTTP API handlers exposing live course metrics.
//!
//! - **GET /users**: roster summaries
//! - **GET /users/:nickname**: one user's full metrics
//! - **GET /users/:nickname/labs**: per-lab activity, in course order
//! - **GET /users/:nickname/calendar**: per-day activity
//! - **GET /updates/recent**: latest lab/topic notifications
//! - **GET /channels**: number of live channels
//! - **GET /lookup/:opaque_id**: one user fetched fresh from the store
//! - **GET /health**: health check
//!
//! Handlers read the live roster. Only `/lookup` goes to the store.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::course::Course;
use crate::error::MetricsError;
use crate::feed::{ActivityFeed, ActivityUpdate};
use crate::identity::IdentityService;
use crate::model::{DayMeasure, Metric, UserMetric, UserSummary};
use crate::service::MetricsService;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<MetricsService>,
    pub course: Arc<Course>,
    pub feed: ActivityFeed,
    pub identity: Arc<dyn IdentityService>,
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/:nickname", get(get_user))
        .route("/users/:nickname/labs", get(get_user_labs))
        .route("/users/:nickname/calendar", get(get_user_calendar))
        .route("/updates/recent", get(get_recent_updates))
        .route("/channels", get(get_channels))
        .route("/lookup/:opaque_id", get(lookup_user))
        .route("/health", get(health_check))
        .with_state(state)
}

/// Response for GET /users.
#[derive(Debug, Clone, Serialize)]
pub struct UsersResponse {
    pub count: usize,
    pub users: Vec<UserSummary>,
}

/// One lab next to the user's activity for it.
#[derive(Debug, Clone, Serialize)]
pub struct LabActivityView {
    pub lab: String,
    pub route: String,
    pub activity: Option<Metric>,
}

/// Query parameters for GET /updates/recent.
#[derive(Debug, Deserialize)]
pub struct UpdatesQuery {
    /// Maximum number of updates (default: 50).
    #[serde(default = "default_updates_limit")]
    pub limit: usize,
}

fn default_updates_limit() -> usize {
    50
}

/// Response for GET /updates/recent.
#[derive(Debug, Clone, Serialize)]
pub struct UpdatesResponse {
    pub limit: usize,
    pub updates: Vec<ActivityUpdate>,
}

/// Response for GET /channels.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelsResponse {
    pub active: usize,
    pub users: usize,
}

/// GET /users - List roster summaries, ordered by nickname.
///
/// # Response
///
/// ```json
/// {
///     "count": 1,
///     "users": [
///         {
///             "nickname": "ada",
///             "name": "Ada Lovelace",
///             "online_status": "online",
///             "count": 12,
///             "duration": 360,
///             "labs_active": 3,
///             "labs_total": 5
///         }
///     ]
/// }
/// ```
#[instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> Json<UsersResponse> {
    let users: Vec<UserSummary> = state
        .service
        .roster()
        .snapshot()
        .values()
        .map(UserMetric::summary)
        .collect();

    debug!(count = users.len(), "Roster listed");
    Json(UsersResponse {
        count: users.len(),
        users,
    })
}

/// GET /users/:nickname - Full metrics for one user.
///
/// Returns `404 Not Found` for nicknames outside the roster.
#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(nickname): Path<String>,
) -> Result<Json<UserMetric>, StatusCode> {
    lookup(&state, &nickname).map(Json)
}

/// GET /users/:nickname/labs - Lab activity paired with the course's labs.
#[instrument(skip(state))]
pub async fn get_user_labs(
    State(state): State<AppState>,
    Path(nickname): Path<String>,
) -> Result<Json<Vec<LabActivityView>>, StatusCode> {
    let user = lookup(&state, &nickname)?;

    let labs = state
        .course
        .labs()
        .iter()
        .zip(user.lab_activity)
        .map(|(lab, activity)| LabActivityView {
            lab: lab.title.clone(),
            route: lab.route.clone(),
            activity,
        })
        .collect();

    Ok(Json(labs))
}

/// GET /users/:nickname/calendar - Per-day activity in store order.
#[instrument(skip(state))]
pub async fn get_user_calendar(
    State(state): State<AppState>,
    Path(nickname): Path<String>,
) -> Result<Json<Vec<DayMeasure>>, StatusCode> {
    lookup(&state, &nickname).map(|user| Json(user.calendar_activity))
}

/// GET /updates/recent - Latest lab and topic notifications, newest first.
#[instrument(skip(state))]
pub async fn get_recent_updates(
    State(state): State<AppState>,
    Query(query): Query<UpdatesQuery>,
) -> Json<UpdatesResponse> {
    Json(UpdatesResponse {
        limit: query.limit,
        updates: state.feed.recent(query.limit),
    })
}

/// GET /channels - Live channel count.
#[instrument(skip(state))]
pub async fn get_channels(State(state): State<AppState>) -> Json<ChannelsResponse> {
    Json(ChannelsResponse {
        active: state.service.active_channels().await,
        users: state.service.roster().len(),
    })
}

/// GET /lookup/:opaque_id - Fetch one user by opaque identifier.
///
/// Reads the store directly, so users outside the roster are found too.
/// Unknown identifiers and absent users give `404 Not Found`; any other
/// store failure gives `502 Bad Gateway`.
#[instrument(skip(state))]
pub async fn lookup_user(
    State(state): State<AppState>,
    Path(opaque_id): Path<String>,
) -> Result<Json<UserMetric>, StatusCode> {
    state
        .service
        .fetch_user_by_id(&state.course, &opaque_id, state.identity.as_ref())
        .await
        .map(Json)
        .map_err(|err| match err {
            MetricsError::Decryption(_) | MetricsError::UserNotFound(_) => {
                debug!(error = %err, "Lookup found no user");
                StatusCode::NOT_FOUND
            }
            err => {
                warn!(error = %err, "Lookup failed");
                StatusCode::BAD_GATEWAY
            }
        })
}

/// GET /health - Simple health check endpoint.
pub async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

fn lookup(state: &AppState, nickname: &str) -> Result<UserMetric, StatusCode> {
    state.service.roster().get(nickname).ok_or_else(|| {
        debug!(nickname = %nickname, "Unknown user");
        StatusCode::NOT_FOUND
    })
}
