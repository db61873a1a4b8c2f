//! Resolution of opaque user identifiers to emails.
//!
//! Links shared outside the platform carry an opaque identifier instead of
//! the user's email. Fetching such a user first resolves the identifier
//! through an [`IdentityService`].

use std::collections::HashMap;

use crate::error::{MetricsError, Result};

pub trait IdentityService: Send + Sync {
    /// Resolve `opaque_id` to the plaintext email it stands for.
    fn decrypt(&self, opaque_id: &str) -> Result<String>;
}

/// Identity service backed by a fixed table of identifier to email.
#[derive(Debug, Clone, Default)]
pub struct MappedIdentity {
    emails: HashMap<String, String>,
}

impl MappedIdentity {
    pub fn new(emails: HashMap<String, String>) -> Self {
        Self { emails }
    }

    pub fn len(&self) -> usize {
        self.emails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }
}

impl IdentityService for MappedIdentity {
    fn decrypt(&self, opaque_id: &str) -> Result<String> {
        self.emails
            .get(opaque_id)
            .cloned()
            .ok_or_else(|| MetricsError::Decryption(opaque_id.to_string()))
    }
}
