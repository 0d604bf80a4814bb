//! Celbridge Core - Command execution contracts
//!
//! This crate provides the building blocks the execution engine is made of,
//! including:
//! - The Operation contract, flags and the entry wrapper carrying identity
//! - The identity-deduplicated operation queue
//! - The completion bridge used by "enqueue and await"
//! - Message, workspace and factory contracts for external collaborators
//! - The error facility and the structured logging facility

pub mod completion;
pub mod errors;
pub mod factory;
pub mod logging_facility;
pub mod messages;
pub mod operation;
pub mod queue;
pub mod workspace;

// Used by the logging macros
pub use celbridge_core_types::schema;

// Re-export commonly used types
pub use celbridge_core_types::{OperationId, Provenance};
pub use completion::{CompletionBridge, CompletionSender};
pub use errors::{CommandError, ExError, ExErrorKind, OperationResult, Result};
pub use factory::{OperationFactory, OperationRegistry};
pub use messages::{BroadcastPublisher, EngineMessage, MessagePublisher};
pub use operation::{Operation, OperationEntry, OperationFlags, OperationSummary};
pub use queue::OperationQueue;
pub use workspace::{NoWorkspace, WorkspaceCollaborator};
