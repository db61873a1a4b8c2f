//! Projection of normalized activity trees onto course structure.
//!
//! A projected [`UserMetric`] always carries exactly one `lab_activity`
//! entry per course lab, in course order, so callers can correlate the two
//! by position. Labs without recorded activity are `None`.

use serde_json::Value;

use crate::course::{Course, LearningObject};
use crate::error::Result;
use crate::locate::{TitleIndex, find_in};
use crate::model::{CALENDAR_ID, DayMeasure, Metric, UserMetric};
use crate::normalize::normalize;

/// Id given to the root of a single user's normalized payload.
pub const ROOT_ID: &str = "root";

/// Above this many labs, lookups go through a [`TitleIndex`] instead of
/// one scan per lab.
const INDEXED_LOOKUP_MIN_LABS: usize = 8;

/// Normalize a raw user payload and project it against the course.
pub fn project(user_id: &str, raw: &Value, course: &Course) -> Result<UserMetric> {
    let activity = normalize(ROOT_ID, raw)?;
    Ok(project_metric(user_id, activity, course.labs()))
}

/// Project an already-normalized user tree.
pub fn project_metric(user_id: &str, activity: Metric, labs: &[LearningObject]) -> UserMetric {
    let lab_activity = lab_activity(&activity, labs);
    let calendar_activity = calendar_activity(&activity);

    UserMetric {
        user_id: user_id.to_string(),
        email: owned_str(&activity, "email"),
        name: owned_str(&activity, "name"),
        nickname: owned_str(&activity, "nickname"),
        picture: owned_str(&activity, "picture"),
        online_status: owned_str(&activity, "onlineStatus"),
        title: activity.title.clone(),
        count: activity.count_field("count"),
        last: owned_str(&activity, "last"),
        duration: activity.count_field("duration"),
        activity,
        lab_activity,
        calendar_activity,
    }
}

/// Locate each lab's activity among the user's nodes.
///
/// The user's own root is not a candidate; only its descendants are.
pub fn lab_activity(activity: &Metric, labs: &[LearningObject]) -> Vec<Option<Metric>> {
    if labs.len() < INDEXED_LOOKUP_MIN_LABS {
        return labs
            .iter()
            .map(|lab| find_in(&lab.title, &activity.metrics).cloned())
            .collect();
    }

    let index = TitleIndex::over(&activity.metrics);
    labs.iter()
        .map(|lab| index.get(&lab.title).cloned())
        .collect()
}

/// Per-day measures from the user's `calendar` node, in store order.
pub fn calendar_activity(activity: &Metric) -> Vec<DayMeasure> {
    let Some(calendar) = activity.child(CALENDAR_ID) else {
        return Vec::new();
    };

    calendar
        .fields
        .iter()
        .map(|(date, metric)| DayMeasure {
            date: date.clone(),
            metric: metric.clone(),
        })
        .collect()
}

fn owned_str(metric: &Metric, key: &str) -> Option<String> {
    metric.str_field(key).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn lab(n: usize) -> LearningObject {
        LearningObject {
            title: format!("Lab {n}"),
            route: format!("/lab/web-dev.example.org/topic-0{n}/unit-1/book-{n}"),
            id: format!("book-{n}"),
        }
    }

    fn course_with_labs(count: usize) -> Course {
        Course {
            url: "web-dev.example.org".to_string(),
            walls: HashMap::from([("lab".to_string(), (1..=count).map(lab).collect())]),
            topics: vec![],
        }
    }

    fn raw_user() -> Value {
        json!({
            "email": "ada@example.com",
            "name": "Ada L",
            "nickname": "ada",
            "picture": "https://example.org/ada.png",
            "onlineStatus": "online",
            "count": 12,
            "last": "2024-01-02T10:00:00",
            "duration": 360,
            "topic-01": {
                "title": "Topic 1",
                "unit-1": {
                    "book-1": { "title": "Lab 1", "count": 4 }
                }
            },
            "topic-03": {
                "unit-1": {
                    "book-3": { "title": "Lab 3", "count": 1 }
                }
            }
        })
    }

    #[test]
    fn test_project_identity_fields() {
        let user = project("ada*example*com", &raw_user(), &course_with_labs(3)).unwrap();

        assert_eq!(user.user_id, "ada*example*com");
        assert_eq!(user.email.as_deref(), Some("ada@example.com"));
        assert_eq!(user.name.as_deref(), Some("Ada L"));
        assert_eq!(user.nickname.as_deref(), Some("ada"));
        assert_eq!(user.online_status.as_deref(), Some("online"));
        assert_eq!(user.count, Some(12));
        assert_eq!(user.duration, Some(360));
        assert_eq!(user.last.as_deref(), Some("2024-01-02T10:00:00"));
        assert_eq!(user.activity.id, ROOT_ID);
    }

    #[test]
    fn test_lab_activity_is_positional() {
        let user = project("ada", &raw_user(), &course_with_labs(3)).unwrap();

        assert_eq!(user.lab_activity.len(), 3);
        assert_eq!(
            user.lab_activity[0].as_ref().map(|m| m.id.as_str()),
            Some("book-1")
        );
        assert!(user.lab_activity[1].is_none());
        assert_eq!(user.lab_activity[2].as_ref().and_then(|m| m.count_field("count")), Some(1));
    }

    #[test]
    fn test_lab_activity_length_matches_labs_for_any_payload() {
        for labs in [0, 1, 5, 20] {
            let course = course_with_labs(labs);

            for raw in [json!({}), raw_user(), json!({ "x": { "title": "Lab 1" } })] {
                let user = project("u", &raw, &course).unwrap();
                assert_eq!(user.lab_activity.len(), labs);
            }
        }
    }

    #[test]
    fn test_indexed_lookup_matches_scan() {
        let course = course_with_labs(INDEXED_LOOKUP_MIN_LABS + 2);
        let activity = normalize(ROOT_ID, &raw_user()).unwrap();

        let indexed = lab_activity(&activity, course.labs());
        let scanned: Vec<_> = course
            .labs()
            .iter()
            .map(|lab| find_in(&lab.title, &activity.metrics).cloned())
            .collect();

        assert_eq!(indexed, scanned);
        assert_eq!(indexed.iter().filter(|m| m.is_some()).count(), 2);
    }

    #[test]
    fn test_root_title_is_not_a_lab_match() {
        let course = course_with_labs(1);
        let user = project("u", &json!({ "title": "Lab 1" }), &course).unwrap();

        assert_eq!(user.title.as_deref(), Some("Lab 1"));
        assert_eq!(user.lab_activity, vec![None]);
    }

    #[test]
    fn test_calendar_activity_in_store_order() {
        let raw = json!({ "calendar": { "2024-01-01": 3, "2024-01-02": 5 } });

        let user = project("u", &raw, &course_with_labs(0)).unwrap();

        assert_eq!(
            user.calendar_activity,
            vec![
                DayMeasure { date: "2024-01-01".to_string(), metric: json!(3) },
                DayMeasure { date: "2024-01-02".to_string(), metric: json!(5) },
            ]
        );
    }

    #[test]
    fn test_missing_calendar_is_empty() {
        let user = project("u", &raw_user(), &course_with_labs(1)).unwrap();

        assert!(user.calendar_activity.is_empty());
    }

    #[test]
    fn test_project_rejects_scalar_payload() {
        assert!(project("u", &json!(3), &course_with_labs(1)).is_err());
    }
}
