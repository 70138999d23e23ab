//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! including identifier validation, clock markers and import payloads.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Record identity is empty or otherwise unusable
    #[error("Invalid record ID: {0}")]
    InvalidId(String),

    /// User scope is empty or otherwise unusable
    #[error("Invalid user scope: {0}")]
    InvalidScope(String),

    /// Last-modified marker is not in the fixed-width UTC encoding
    #[error("Invalid last-modified marker: {0}")]
    InvalidTimestamp(String),

    /// Import payload is not a backup document
    #[error("Malformed import: {0}")]
    MalformedImport(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
