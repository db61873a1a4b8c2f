//! Course Metrics - live per-user activity metrics for an online course.
//!
//! # Overview
//!
//! Learner activity is recorded in a hierarchical realtime store, under a
//! namespace derived from the course URL. This crate reads that tree,
//! normalizes it into uniform [`model::Metric`] nodes, projects each user's
//! subtree onto the course's labs and calendar, and keeps the resulting
//! roster current through live channels per user.
//!
//! # Modules
//!
//! - [`normalize`]: Raw JSON tree to [`model::Metric`] tree
//! - [`locate`]: Title search over metric trees
//! - [`project`]: Per-user projection onto labs and calendar
//! - [`roster`]: Roster fetching, enrollment filtering, shared roster
//! - [`subscriptions`]: Live status, lab and topic channels
//! - [`service`]: Start/stop lifecycle over fetch and subscriptions
//! - [`store`]: Realtime store contract plus in-memory and REST adapters
//! - [`feed`]: Bounded log of recent activity updates
//! - [`api`]: HTTP API handlers
//! - [`config`]: Environment configuration and input files

pub mod api;
pub mod config;
pub mod course;
pub mod error;
pub mod feed;
pub mod identity;
pub mod locate;
pub mod model;
pub mod normalize;
pub mod paths;
pub mod project;
pub mod roster;
pub mod service;
pub mod store;
pub mod subscriptions;
