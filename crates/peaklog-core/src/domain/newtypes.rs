//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for record identities and
//! user scopes. Constructors validate their input; serde deserialization is
//! transparent so that records arriving from the remote store or from a
//! backup file are accepted verbatim.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// RecordId
// ============================================================================

/// Client-generated identity of a syncable record
///
/// Minted once by the creating device and immutable for the lifetime of the
/// record. Unique within a user's record space.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Creates a RecordId from an existing string
    ///
    /// # Errors
    /// Returns `DomainError::InvalidId` if the string is empty or blank.
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(DomainError::InvalidId(id));
        }
        Ok(Self(id))
    }

    /// Mints a fresh random identity (UUID v4)
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the identity as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for RecordId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// UserScope
// ============================================================================

/// The remote record space of one authenticated user
///
/// Derived from the authenticated identity (the provider's user id). Its
/// absence means the engine runs local-only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserScope(String);

impl UserScope {
    /// Creates a scope for the given user id
    ///
    /// # Errors
    /// Returns `DomainError::InvalidScope` if the id is empty, blank or
    /// contains a path separator.
    pub fn new(user_id: impl Into<String>) -> Result<Self, DomainError> {
        let user_id = user_id.into();
        if user_id.trim().is_empty() || user_id.contains('/') {
            return Err(DomainError::InvalidScope(user_id));
        }
        Ok(Self(user_id))
    }

    /// Returns the user id
    pub fn user_id(&self) -> &str {
        &self.0
    }

    /// Remote path of a collection within this scope (`users/<uid>/<collection>`)
    pub fn collection_path(&self, collection: &str) -> String {
        format!("users/{}/{}", self.0, collection)
    }
}

impl Display for UserScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserScope {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}
