//! Integration tests for the course metrics API.
//!
//! Each test starts a service over an in-memory store, so live updates can
//! be driven by writing to the store.

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{Value, json};

use course_metrics::api::{AppState, router};
use course_metrics::course::{Course, LearningObject, Student, Topic};
use course_metrics::feed::{ActivityFeed, UpdateKind};
use course_metrics::identity::MappedIdentity;
use course_metrics::service::MetricsService;
use course_metrics::store::MemoryStore;

fn course() -> Course {
    Course {
        url: "web-dev.example.org".to_string(),
        walls: HashMap::from([(
            "lab".to_string(),
            vec![
                LearningObject {
                    title: "Lab 1".to_string(),
                    route: "/lab/web-dev.example.org/topic-01/unit-1/book-1".to_string(),
                    id: "book-1".to_string(),
                },
                LearningObject {
                    title: "Lab 2".to_string(),
                    route: "/lab/web-dev.example.org/topic-02/unit-1/book-2".to_string(),
                    id: "book-2".to_string(),
                },
            ],
        )]),
        topics: vec![Topic {
            lo: LearningObject {
                title: "Topic 1".to_string(),
                route: "/topic/web-dev.example.org/topic-01".to_string(),
                id: "topic-01".to_string(),
            },
        }],
    }
}

fn store_data() -> Value {
    json!({
        "web-dev": {
            "usage": { "count": 40 },
            "users": {
                "ada*example*com": {
                    "email": "ada@example.com",
                    "name": "ada-handle",
                    "nickname": "ada",
                    "onlineStatus": "offline",
                    "count": 12,
                    "duration": 360,
                    "topic-01": {
                        "title": "Topic 1",
                        "unit-1": { "book-1": { "title": "Lab 1", "count": 3, "duration": 90 } }
                    },
                    "calendar": { "2024-01-01": 3, "2024-01-02": 5 }
                },
                "bob*example*com": {
                    "email": "bob@example.com",
                    "nickname": "bob",
                    "onlineStatus": "online"
                }
            }
        }
    })
}

struct Harness {
    server: TestServer,
    store: Arc<MemoryStore>,
    service: Arc<MetricsService>,
}

async fn create_test_server() -> Harness {
    let store = Arc::new(MemoryStore::with_data(store_data()));
    let service = Arc::new(MetricsService::new(store.clone()));
    let feed = ActivityFeed::default();
    let course = Arc::new(course());

    service
        .start(
            &course,
            feed.callback(UpdateKind::Lab),
            feed.callback(UpdateKind::Topic),
        )
        .await
        .unwrap();

    let state = AppState {
        service: service.clone(),
        course,
        feed,
        identity: Arc::new(MappedIdentity::new(HashMap::from([
            ("x-ada".to_string(), "ada@example.com".to_string()),
            ("x-gone".to_string(), "gone@example.com".to_string()),
        ]))),
    };

    Harness {
        server: TestServer::new(router(state)).unwrap(),
        store,
        service,
    }
}

#[tokio::test]
async fn test_health_endpoint() {
    let harness = create_test_server().await;

    let response = harness.server.get("/health").await;

    response.assert_status_ok();
}

#[tokio::test]
async fn test_list_users() {
    let harness = create_test_server().await;

    let response = harness.server.get("/users").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["count"], 2);
    assert_eq!(body["users"][0]["nickname"], "ada");
    assert_eq!(body["users"][0]["count"], 12);
    assert_eq!(body["users"][0]["labs_active"], 1);
    assert_eq!(body["users"][0]["labs_total"], 2);
    assert_eq!(body["users"][1]["nickname"], "bob");
    assert_eq!(body["users"][1]["online_status"], "online");
}

#[tokio::test]
async fn test_get_user() {
    let harness = create_test_server().await;

    let response = harness.server.get("/users/ada").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["user_id"], "ada*example*com");
    assert_eq!(body["email"], "ada@example.com");
    assert_eq!(body["duration"], 360);
}

#[tokio::test]
async fn test_get_unknown_user() {
    let harness = create_test_server().await;

    let response = harness.server.get("/users/nobody").await;

    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_user_labs_follow_course_order() {
    let harness = create_test_server().await;

    let response = harness.server.get("/users/ada/labs").await;

    response.assert_status_ok();
    let body: Value = response.json();
    let labs = body.as_array().unwrap();
    assert_eq!(labs.len(), 2);
    assert_eq!(labs[0]["lab"], "Lab 1");
    assert_eq!(labs[0]["activity"]["title"], "Lab 1");
    assert_eq!(labs[1]["lab"], "Lab 2");
    assert!(labs[1]["activity"].is_null());
}

#[tokio::test]
async fn test_user_calendar() {
    let harness = create_test_server().await;

    let response = harness.server.get("/users/ada/calendar").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(
        body,
        json!([
            { "date": "2024-01-01", "metric": 3 },
            { "date": "2024-01-02", "metric": 5 }
        ])
    );
}

#[tokio::test]
async fn test_status_change_is_visible() {
    let harness = create_test_server().await;

    harness
        .store
        .set("web-dev/users/ada*example*com/onlineStatus", json!("online"));

    let body: Value = harness.server.get("/users/ada").await.json();
    assert_eq!(body["online_status"], "online");
}

#[tokio::test]
async fn test_recent_updates_after_topic_write() {
    let harness = create_test_server().await;

    harness.store.set(
        "web-dev/users/bob*example*com/topic-01",
        json!({ "title": "Topic 1", "unit-1": { "book-1": { "title": "Lab 1", "count": 1 } } }),
    );

    let response = harness
        .server
        .get("/updates/recent")
        .add_query_param("limit", 2)
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["limit"], 2);
    let updates = body["updates"].as_array().unwrap();
    assert_eq!(updates.len(), 2);
    assert!(updates.iter().all(|u| u["nickname"] == "bob"));
    assert!(updates.iter().any(|u| u["kind"] == "topic" && u["title"] == "Topic 1"));
    assert!(updates.iter().any(|u| u["kind"] == "lab" && u["title"] == "Lab 1"));
}

#[tokio::test]
async fn test_channels_shrink_after_enrollment_filter() {
    let harness = create_test_server().await;

    let body: Value = harness.server.get("/channels").await.json();
    assert_eq!(body["active"], 6);
    assert_eq!(body["users"], 2);

    harness
        .service
        .restrict_to_enrolled(&[Student {
            github: "bob".to_string(),
            name: "Bob Builder".to_string(),
        }])
        .await;

    let body: Value = harness.server.get("/channels").await.json();
    assert_eq!(body["active"], 3);
    assert_eq!(body["users"], 1);
    harness.server.get("/users/ada").await.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_lookup_by_opaque_id() {
    let harness = create_test_server().await;

    let response = harness.server.get("/lookup/x-ada").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["nickname"], "ada");

    harness
        .server
        .get("/lookup/x-gone")
        .await
        .assert_status(StatusCode::NOT_FOUND);
    harness
        .server
        .get("/lookup/unknown")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}
