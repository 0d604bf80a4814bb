//! Workspace synchronizer
//!
//! Adapter between the execution loop and the workspace collaborator. Called
//! once per cycle so that pending persistence work from the previous
//! operation is flushed before the next one starts.

use celbridge_core::errors::{ExError, ExErrorKind, OperationResult};
use celbridge_core::workspace::WorkspaceCollaborator;
use std::sync::Arc;
use std::time::Duration;

pub struct WorkspaceSynchronizer {
    workspace: Arc<dyn WorkspaceCollaborator>,
}

impl WorkspaceSynchronizer {
    pub fn new(workspace: Arc<dyn WorkspaceCollaborator>) -> Self {
        Self { workspace }
    }

    /// Flush pending workspace work
    ///
    /// A no-op success when no project is loaded.
    ///
    /// # Errors
    ///
    /// Returns a `Synchronization` error wrapping the workspace failure.
    pub async fn synchronize(&self, delta: Duration) -> OperationResult {
        if !self.workspace.is_project_loaded() {
            return Ok(());
        }

        self.workspace
            .advance_and_flush(delta)
            .await
            .map_err(|err| {
                ExError::new(ExErrorKind::Synchronization)
                    .with_op("synchronize_workspace")
                    .with_message("Workspace flush failed")
                    .with_source(err)
            })
    }
}

impl std::fmt::Debug for WorkspaceSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspaceSynchronizer")
            .field("project_loaded", &self.workspace.is_project_loaded())
            .finish()
    }
}
