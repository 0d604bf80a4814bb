//! Correlation types for operation tracking
//!
//! These types identify operations across the submission and execution
//! boundary and record where an operation was submitted from.

use serde::{Deserialize, Serialize};
use std::panic::Location;
use uuid::Uuid;

/// Unique identity of a single submitted operation
///
/// Used by the operation queue for deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationId(String);

impl OperationId {
    /// Generate a new random OperationId using UUIDv7
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Create from an existing string (for deserialization)
    pub fn from_string(s: String) -> Self {
        Self(s)
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OperationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Free-text description of where an operation was submitted from
///
/// Diagnostic only; never affects execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance(String);

impl Provenance {
    /// Create a provenance tag from arbitrary text
    pub fn new(description: impl Into<String>) -> Self {
        Self(description.into())
    }

    /// Tag with the source location of the caller
    ///
    /// Functions marked `#[track_caller]` propagate their own caller here.
    #[track_caller]
    pub fn caller() -> Self {
        Self::from_location(Location::caller())
    }

    /// Tag with an explicit source location
    pub fn from_location(location: &Location<'_>) -> Self {
        Self(format!(
            "{}:{}:{}",
            location.file(),
            location.line(),
            location.column()
        ))
    }

    /// Get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
