//! Core types shared across Celbridge command execution crates
//!
//! This crate provides foundational types used by the error facility,
//! the logging facility and the execution engine:
//!
//! - **Correlation types**: OperationId, Provenance
//! - **Schema constants**: Canonical field keys and event names

pub mod correlation;
pub mod schema;

pub use correlation::{OperationId, Provenance};
