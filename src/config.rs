//! Service configuration, read from the environment, plus the JSON input
//! files it points at.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `COURSE_METRICS_PORT` | `3000` |
//! | `COURSE_METRICS_STORE_URL` | required |
//! | `COURSE_METRICS_STORE_AUTH` | none |
//! | `COURSE_METRICS_POLL_SECS` | `5` |
//! | `COURSE_METRICS_COURSE_FILE` | required |
//! | `COURSE_METRICS_STUDENTS_FILE` | none |
//! | `COURSE_METRICS_IDENTITY_FILE` | none |
//! | `COURSE_METRICS_FEED_CAPACITY` | `200` |

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, anyhow};
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::course::{Course, Student};
use crate::feed::DEFAULT_FEED_CAPACITY;
use crate::identity::MappedIdentity;

/// Default port if not specified via environment variable.
pub const DEFAULT_PORT: u16 = 3000;

/// Default polling interval of REST store listeners, in seconds.
pub const DEFAULT_POLL_SECS: u64 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub port: u16,
    pub store_url: String,
    pub store_auth: Option<String>,
    pub poll_interval: Duration,
    pub course_file: PathBuf,
    pub students_file: Option<PathBuf>,
    pub identity_file: Option<PathBuf>,
    pub feed_capacity: usize,
}

impl ServiceConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from any variable source.
    ///
    /// Unparseable numbers fall back to their defaults with a warning. Empty
    /// values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let required = |key: &str| var(key).ok_or_else(|| anyhow!("{key} must be set"));

        Ok(Self {
            port: parse_or(var("COURSE_METRICS_PORT"), "COURSE_METRICS_PORT", DEFAULT_PORT),
            store_url: required("COURSE_METRICS_STORE_URL")?,
            store_auth: var("COURSE_METRICS_STORE_AUTH"),
            poll_interval: Duration::from_secs(parse_or(
                var("COURSE_METRICS_POLL_SECS"),
                "COURSE_METRICS_POLL_SECS",
                DEFAULT_POLL_SECS,
            )),
            course_file: required("COURSE_METRICS_COURSE_FILE")?.into(),
            students_file: var("COURSE_METRICS_STUDENTS_FILE").map(PathBuf::from),
            identity_file: var("COURSE_METRICS_IDENTITY_FILE").map(PathBuf::from),
            feed_capacity: parse_or(
                var("COURSE_METRICS_FEED_CAPACITY"),
                "COURSE_METRICS_FEED_CAPACITY",
                DEFAULT_FEED_CAPACITY,
            ),
        })
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, key: &str, default: T) -> T {
    match value {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "Invalid value, using default");
            default
        }),
        None => default,
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

pub fn load_course(path: &Path) -> anyhow::Result<Course> {
    read_json(path)
}

pub fn load_students(path: &Path) -> anyhow::Result<Vec<Student>> {
    read_json(path)
}

/// Load an identity table: a JSON object of opaque id to email.
pub fn load_identity(path: &Path) -> anyhow::Result<MappedIdentity> {
    read_json::<HashMap<String, String>>(path).map(MappedIdentity::new)
}
