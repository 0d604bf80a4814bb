//! Workspace collaborator contract
//!
//! The workspace owns project persistence. The engine asks it to advance and
//! flush pending work once per loop cycle, before the next operation runs.

use crate::errors::OperationResult;
use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait WorkspaceCollaborator: Send + Sync {
    fn is_project_loaded(&self) -> bool;

    /// Advance internal timers by `delta` and flush any pending saves
    ///
    /// May block on persistence work; the engine waits for it to finish.
    async fn advance_and_flush(&self, delta: Duration) -> OperationResult;
}

/// Workspace used when no project support is wired in
#[derive(Debug, Default, Clone, Copy)]
pub struct NoWorkspace;

#[async_trait]
impl WorkspaceCollaborator for NoWorkspace {
    fn is_project_loaded(&self) -> bool {
        false
    }

    async fn advance_and_flush(&self, _delta: Duration) -> OperationResult {
        Ok(())
    }
}
