//! Data models for course activity metrics.
//!
//! A [`Metric`] is one node of a user's activity tree as recorded by the
//! realtime store. Nodes keep their scalar fields in the order the store
//! delivered them, and their nested nodes in `metrics`.
//!
//! A [`UserMetric`] wraps a user's tree with identity fields and two views
//! derived against the course: per-lab activity and per-day calendar
//! activity.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key under which a node's display title is recorded.
pub const TITLE_KEY: &str = "title";

/// Id of the child node holding per-day activity.
pub const CALENDAR_ID: &str = "calendar";

/// One node of a normalized activity tree.
///
/// A node may be a leaf (no `metrics`), an internal node, or both at once:
/// the store interleaves scalar fields and nested mappings freely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    /// The key this node was stored under.
    pub id: String,

    /// The node's `title` field, when it is a string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Nested nodes, in store order.
    #[serde(default)]
    pub metrics: Vec<Metric>,

    /// Scalar fields, in store order.
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Metric {
    /// Create an empty node.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Get a scalar field.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Get a scalar field when it is a string.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.field(key).and_then(Value::as_str)
    }

    /// Get a scalar field as a non-negative whole number.
    ///
    /// Fractional values are truncated; negative or non-numeric values yield `None`.
    pub fn count_field(&self, key: &str) -> Option<u64> {
        let value = self.field(key)?;
        value.as_u64().or_else(|| {
            value
                .as_f64()
                .filter(|v| v.is_finite() && *v >= 0.0)
                .map(|v| v as u64)
        })
    }

    /// Find a direct child by id.
    pub fn child(&self, id: &str) -> Option<&Metric> {
        self.metrics.iter().find(|m| m.id == id)
    }

    /// Rebuild the mapping form of this node.
    ///
    /// Normalizing the result under the same id reproduces this node.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        if let Some(title) = &self.title {
            map.insert(TITLE_KEY.to_string(), Value::String(title.clone()));
        }
        for (key, value) in &self.fields {
            map.insert(key.clone(), value.clone());
        }
        for child in &self.metrics {
            map.insert(child.id.clone(), child.to_value());
        }
        Value::Object(map)
    }
}

/// One calendar day's raw measure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayMeasure {
    pub date: String,
    pub metric: Value,
}

/// A user's activity tree annotated with identity and derived views.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserMetric {
    /// Store key of the user record (the sanitized email).
    pub user_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub nickname: Option<String>,
    pub picture: Option<String>,
    pub online_status: Option<String>,
    pub title: Option<String>,
    pub count: Option<u64>,
    pub last: Option<String>,
    pub duration: Option<u64>,

    /// The normalized activity tree.
    pub activity: Metric,

    /// One entry per course lab, in course order.
    pub lab_activity: Vec<Option<Metric>>,

    /// Per-day measures from the `calendar` node, in store order.
    pub calendar_activity: Vec<DayMeasure>,
}

impl UserMetric {
    /// Number of labs with recorded activity.
    pub fn labs_active(&self) -> usize {
        self.lab_activity.iter().filter(|lab| lab.is_some()).count()
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            nickname: self.nickname.clone().unwrap_or_default(),
            name: self.name.clone(),
            online_status: self.online_status.clone(),
            count: self.count,
            duration: self.duration,
            labs_active: self.labs_active(),
            labs_total: self.lab_activity.len(),
        }
    }
}

/// Users keyed by nickname.
pub type Roster = BTreeMap<String, UserMetric>;

/// Compact view of a roster entry for listing.
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub nickname: String,
    pub name: Option<String>,
    pub online_status: Option<String>,
    pub count: Option<u64>,
    pub duration: Option<u64>,
    pub labs_active: usize,
    pub labs_total: usize,
}
