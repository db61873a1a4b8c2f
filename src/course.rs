//! Course context consumed by the metrics engine.
//!
//! The course is built elsewhere and handed in read-only. Only the parts the
//! engine needs are modelled: the course URL, its walls of learning objects
//! and its topics, plus the enrolled students used to filter the roster.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Wall holding the course's labs.
pub const LAB_WALL: &str = "lab";

/// A course-structure item (lab, topic, talk, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningObject {
    pub title: String,
    pub route: String,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub lo: LearningObject,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Course {
    /// Base URL the course is published under, e.g. `"web-dev.example.org"`.
    pub url: String,

    /// Learning objects grouped by category, each in course order.
    #[serde(default)]
    pub walls: HashMap<String, Vec<LearningObject>>,

    #[serde(default)]
    pub topics: Vec<Topic>,
}

impl Course {
    /// All labs in course order; empty when the course has no lab wall.
    pub fn labs(&self) -> &[LearningObject] {
        self.walls.get(LAB_WALL).map(Vec::as_slice).unwrap_or_default()
    }
}

/// An enrolled student, identified by their external-platform handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub github: String,
    pub name: String,
}
