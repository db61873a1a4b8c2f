//! Course Metrics - live per-user activity metrics for an online course.
//!
//! # Overview
//!
//! On startup the server fetches the course roster from the realtime store,
//! opens live channels for every user, and serves the roster over HTTP.
//! Ctrl-C releases every channel before exiting.
//!
//! # API Endpoints
//!
//! - `GET /users` - Roster summaries
//! - `GET /users/:nickname` - One user's metrics
//! - `GET /users/:nickname/labs` - Lab activity in course order
//! - `GET /users/:nickname/calendar` - Per-day activity
//! - `GET /updates/recent` - Latest lab/topic updates
//! - `GET /channels` - Live channel count
//! - `GET /lookup/:opaque_id` - Fetch a user by opaque identifier
//! - `GET /health` - Health check

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use course_metrics::api::{self, AppState};
use course_metrics::config::{ServiceConfig, load_course, load_identity, load_students};
use course_metrics::feed::{ActivityFeed, UpdateKind};
use course_metrics::identity::MappedIdentity;
use course_metrics::service::MetricsService;
use course_metrics::store::RestStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("course_metrics=info".parse()?))
        .init();

    let config = ServiceConfig::from_env()?;
    info!(port = config.port, store = %config.store_url, "Starting course metrics server");

    let course = Arc::new(load_course(&config.course_file)?);
    let students = config
        .students_file
        .as_deref()
        .map(load_students)
        .transpose()?;
    let identity = match config.identity_file.as_deref() {
        Some(path) => load_identity(path)?,
        None => MappedIdentity::default(),
    };
    info!(
        course = %course.url,
        labs = course.labs().len(),
        identities = identity.len(),
        "Course context loaded"
    );

    let mut store = RestStore::new(&config.store_url).with_poll_interval(config.poll_interval);
    if let Some(token) = &config.store_auth {
        store = store.with_auth(token.clone());
    }

    let service = Arc::new(MetricsService::new(Arc::new(store)));
    let feed = ActivityFeed::new(config.feed_capacity);

    let report = service
        .start(
            &course,
            feed.callback(UpdateKind::Lab),
            feed.callback(UpdateKind::Topic),
        )
        .await?;
    info!(
        users = report.users,
        channels = report.channels_opened,
        failures = report.failures.len(),
        "Metrics service started"
    );
    for failure in &report.failures {
        warn!(nickname = %failure.nickname, kind = %failure.kind, error = %failure.message, "Channel not opened");
    }

    if let Some(students) = &students {
        service.restrict_to_enrolled(students).await;
    }

    let state = AppState {
        service: service.clone(),
        course,
        feed,
        identity: Arc::new(identity),
    };
    let app = api::router(state).layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Course metrics is listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let failures = service.stop().await;
    if !failures.is_empty() {
        warn!(failures = failures.len(), "Some channels failed to release");
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Failed to listen for Ctrl-C, running until killed");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
