//! Operation contract
//!
//! An operation is one unit of state-mutating work. Callers wrap it in an
//! [`OperationEntry`], which carries the identity, flags, provenance and
//! optional completion sender the engine needs around the operation itself.

use crate::completion::CompletionSender;
use crate::errors::{CommandError, OperationResult, Result};
use async_trait::async_trait;
use celbridge_core_types::{OperationId, Provenance};
use serde_json::Value;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Declarative post-execution effects requested by an operation
///
/// Only evaluated for operations that ran through the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OperationFlags(u8);

impl OperationFlags {
    pub const NONE: Self = Self(0);
    /// Publish a coalesced resource registry refresh request
    pub const REQUEST_REGISTRY_UPDATE: Self = Self(1 << 0);
    /// Publish an immediate resource registry refresh request
    pub const FORCE_REGISTRY_UPDATE: Self = Self(1 << 1);
    /// Publish a workspace-state-dirty notification
    pub const SAVE_WORKSPACE_STATE: Self = Self(1 << 2);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True when every flag in `other` is also set in `self`
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl BitOr for OperationFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for OperationFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}

/// A unit of state-mutating work executed by the engine
///
/// The engine never runs two operations concurrently through the queue.
/// Failures are returned, not panicked; a panic is caught by the execution
/// loop and treated as a failure.
#[async_trait]
pub trait Operation: Send {
    /// Stable name of this kind of operation, used for logging and queries
    fn kind(&self) -> &'static str;

    /// Post-execution effects; fixed for the lifetime of an instance
    fn flags(&self) -> OperationFlags {
        OperationFlags::NONE
    }

    /// Check the configured state before submission
    ///
    /// Returning an error rejects the submission with
    /// [`CommandError::InvalidOperation`].
    fn validate(&self) -> std::result::Result<(), String> {
        Ok(())
    }

    /// Declared properties, serialized for diagnostic logging only
    fn properties(&self) -> Value {
        Value::Null
    }

    async fn execute(&mut self) -> OperationResult;
}

/// Lightweight description of an operation for lifecycle messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationSummary {
    pub id: OperationId,
    pub kind: &'static str,
    pub provenance: Option<Provenance>,
}

/// An operation together with the metadata the engine tracks for it
pub struct OperationEntry {
    id: OperationId,
    flags: OperationFlags,
    provenance: Option<Provenance>,
    completion: Option<CompletionSender>,
    operation: Box<dyn Operation>,
}

impl OperationEntry {
    /// Wrap an operation, generating a fresh identity
    pub fn new(operation: impl Operation + 'static) -> Self {
        Self::from_boxed(Box::new(operation))
    }

    /// Wrap an already boxed operation, generating a fresh identity
    pub fn from_boxed(operation: Box<dyn Operation>) -> Self {
        Self {
            id: OperationId::new(),
            flags: operation.flags(),
            provenance: None,
            completion: None,
            operation,
        }
    }

    /// Replace the generated identity
    pub fn with_id(mut self, id: OperationId) -> Self {
        self.id = id;
        self
    }

    pub fn id(&self) -> &OperationId {
        &self.id
    }

    pub fn flags(&self) -> OperationFlags {
        self.flags
    }

    pub fn kind(&self) -> &'static str {
        self.operation.kind()
    }

    pub fn provenance(&self) -> Option<&Provenance> {
        self.provenance.as_ref()
    }

    pub fn set_provenance(&mut self, provenance: Provenance) {
        self.provenance = Some(provenance);
    }

    /// Attach the sender half of a completion bridge
    pub fn attach_completion(&mut self, sender: CompletionSender) {
        self.completion = Some(sender);
    }

    /// Detach the completion sender so it can be resolved exactly once
    pub fn take_completion(&mut self) -> Option<CompletionSender> {
        self.completion.take()
    }

    pub fn has_completion(&self) -> bool {
        self.completion.is_some()
    }

    pub fn summary(&self) -> OperationSummary {
        OperationSummary {
            id: self.id.clone(),
            kind: self.kind(),
            provenance: self.provenance.clone(),
        }
    }

    /// Run the operation's own validation
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::InvalidOperation`] when the operation rejects
    /// its configured state.
    pub fn validate(&self) -> Result<()> {
        self.operation
            .validate()
            .map_err(|reason| CommandError::InvalidOperation {
                operation_id: self.id.clone(),
                reason,
            })
    }

    pub fn properties(&self) -> Value {
        self.operation.properties()
    }

    pub async fn execute(&mut self) -> OperationResult {
        self.operation.execute().await
    }
}

impl fmt::Debug for OperationEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationEntry")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("flags", &self.flags)
            .field("provenance", &self.provenance)
            .field("has_completion", &self.has_completion())
            .finish()
    }
}
