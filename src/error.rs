//! Error types for the metrics engine.
//!
//! Read failures propagate to whoever asked for the fetch. Channel failures
//! raised while starting live subscriptions are collected per user instead
//! of aborting the whole start sequence.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MetricsError {
    /// The payload handed to the normalizer is not a mapping.
    #[error("payload for '{0}' is not a mapping")]
    DataShape(String),

    /// A single-user fetch found nothing at the user's path.
    #[error("no activity recorded for user at '{0}'")]
    UserNotFound(String),

    /// An opaque identifier could not be resolved to an email.
    #[error("cannot resolve identifier '{0}' to an email")]
    Decryption(String),

    /// Subscribing to or unsubscribing from a store path failed.
    #[error("channel at '{path}' failed: {reason}")]
    Channel { path: String, reason: String },

    /// A one-shot read against the store failed.
    #[error("read of '{path}' failed: {reason}")]
    Read { path: String, reason: String },

    /// The course context lacks something the operation needs.
    #[error("invalid course context: {0}")]
    Course(String),
}

pub type Result<T> = std::result::Result<T, MetricsError>;
