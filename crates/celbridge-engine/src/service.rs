//! Command service
//!
//! Composition root for the engine: owns the queue, the collaborators and
//! the handle of the running execution loop, and exposes the submission
//! modes.

use crate::config::EngineConfig;
use crate::execution_loop::ExecutionLoop;
use crate::synchronizer::WorkspaceSynchronizer;
use celbridge_core::completion::CompletionBridge;
use celbridge_core::errors::{ExError, ExErrorKind, OperationResult, Result};
use celbridge_core::messages::MessagePublisher;
use celbridge_core::operation::OperationEntry;
use celbridge_core::queue::OperationQueue;
use celbridge_core::workspace::WorkspaceCollaborator;
use celbridge_core_types::{OperationId, Provenance};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// One spawned loop and the signals tied to it
struct LoopRun {
    stop: watch::Sender<bool>,
    /// Closes when the loop task is gone, however it ended
    exited: watch::Receiver<()>,
    handle: JoinHandle<()>,
}

impl LoopRun {
    fn is_alive(&self) -> bool {
        !self.handle.is_finished()
    }
}

struct ServiceInner {
    queue: Arc<OperationQueue>,
    config: EngineConfig,
    workspace: Arc<dyn WorkspaceCollaborator>,
    publisher: Arc<dyn MessagePublisher>,
    run: Mutex<Option<LoopRun>>,
}

impl ServiceInner {
    fn run(&self) -> MutexGuard<'_, Option<LoopRun>> {
        self.run.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Entry point for submitting operations
///
/// Cloning is cheap; all clones drive the same queue and loop. The loop is
/// stopped when the last clone is dropped, since that drops its stop sender.
#[derive(Clone)]
pub struct CommandService {
    inner: Arc<ServiceInner>,
}

impl CommandService {
    /// # Errors
    ///
    /// Returns [`celbridge_core::CommandError::Config`] if `config` fails
    /// [`EngineConfig::validate`].
    pub fn new(
        config: EngineConfig,
        workspace: Arc<dyn WorkspaceCollaborator>,
        publisher: Arc<dyn MessagePublisher>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(ServiceInner {
                queue: Arc::new(OperationQueue::default()),
                config,
                workspace,
                publisher,
                run: Mutex::new(None),
            }),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Spawn the execution loop on the current tokio runtime
    ///
    /// Returns false while a loop is alive, including one that has been asked
    /// to stop but has not exited yet. Must be called from within a runtime.
    pub fn start(&self) -> bool {
        let mut run = self.inner.run();
        if run.as_ref().is_some_and(LoopRun::is_alive) {
            return false;
        }

        let (stop, stop_rx) = watch::channel(false);
        let (exited_tx, exited) = watch::channel(());
        let execution_loop = ExecutionLoop::new(
            self.inner.queue.clone(),
            WorkspaceSynchronizer::new(self.inner.workspace.clone()),
            self.inner.publisher.clone(),
            self.inner.config.cycle_delay(),
            stop_rx,
        );
        let handle = tokio::spawn(async move {
            let _exited = exited_tx;
            execution_loop.run().await;
        });
        *run = Some(LoopRun {
            stop,
            exited,
            handle,
        });
        true
    }

    pub fn is_running(&self) -> bool {
        self.inner.run().as_ref().is_some_and(LoopRun::is_alive)
    }

    /// Ask the running loop to stop at its next cycle boundary
    ///
    /// Queued operations are then discarded, not executed. An operation that
    /// is already executing runs to completion. Does nothing if no loop has
    /// been started.
    pub fn request_stop(&self) {
        if let Some(run) = self.inner.run().as_ref() {
            run.stop.send_replace(true);
        }
    }

    /// Request a stop and wait for the loop task to exit
    ///
    /// The loop stays registered until it has exited, so dropping this future
    /// early leaves `start` refusing until then. Concurrent callers all wait.
    pub async fn stop(&self) {
        let mut exited = {
            let run = self.inner.run();
            let Some(run) = run.as_ref() else {
                return;
            };
            run.stop.send_replace(true);
            run.exited.clone()
        };

        // Only ever errors, once the loop task has dropped the sender
        while exited.changed().await.is_ok() {}

        let finished = {
            let mut run = self.inner.run();
            let same_run = run
                .as_ref()
                .is_some_and(|current| current.exited.same_channel(&exited));
            if same_run {
                run.take()
            } else {
                None
            }
        };
        if let Some(finished) = finished {
            if let Err(err) = finished.handle.await {
                tracing::error!(error = %err, "Execution loop task failed");
            }
        }
    }

    /// Fire-and-forget submission
    ///
    /// # Errors
    ///
    /// Returns [`celbridge_core::CommandError::DuplicateOperation`] if an
    /// operation with the same identity is already queued, or
    /// [`celbridge_core::CommandError::InvalidOperation`] if the operation
    /// rejects its own configuration.
    #[track_caller]
    pub fn enqueue(&self, mut entry: OperationEntry) -> Result<()> {
        entry.set_provenance(Provenance::caller());
        self.submit(entry)
    }

    /// Execute directly, bypassing the queue, workspace synchronization and
    /// flag processing
    ///
    /// Not serialized with the loop: a queued operation may run at the same
    /// wall-clock time.
    #[track_caller]
    pub fn execute_immediate(
        &self,
        mut entry: OperationEntry,
    ) -> impl Future<Output = OperationResult> + Send + 'static {
        entry.set_provenance(Provenance::caller());
        async move {
            entry.validate()?;
            let kind = entry.kind();
            tracing::debug!(op = kind, operation_id = %entry.id(), "Executing operation immediately");

            let result = entry.execute().await;
            if let Err(err) = &result {
                tracing::warn!(
                    op = kind,
                    operation_id = %entry.id(),
                    error = %err,
                    "Immediate operation failed"
                );
            }
            result
        }
    }

    /// Enqueue and wait for the operation to finish
    ///
    /// The operation is queued when this is called, before the returned future
    /// is first polled. If queuing fails the future resolves to that error
    /// without waiting. A failure reported by the operation is returned
    /// wrapped, with the original as its source; an operation discarded by a
    /// stop resolves to `Cancelled`.
    #[track_caller]
    pub fn execute_and_wait(
        &self,
        mut entry: OperationEntry,
    ) -> impl Future<Output = OperationResult> + Send + 'static {
        entry.set_provenance(Provenance::caller());
        let id = entry.id().clone();
        let kind = entry.kind();
        let (sender, bridge) = CompletionBridge::new(id.clone());
        entry.attach_completion(sender);
        let submitted = self.submit(entry);

        async move {
            submitted?;
            bridge.wait().await.map_err(|err| match err.kind() {
                ExErrorKind::Cancelled => err,
                _ => ExError::new(ExErrorKind::OperationFailed)
                    .with_op(kind)
                    .with_operation_id(id)
                    .with_message(format!("Operation '{}' failed", kind))
                    .with_source(err),
            })
        }
    }

    fn submit(&self, entry: OperationEntry) -> Result<()> {
        entry.validate()?;

        let id = entry.id().clone();
        let kind = entry.kind();
        if let Err(err) = self.inner.queue.push_back(entry) {
            tracing::warn!(op = kind, operation_id = %id, error = %err, "Submission rejected");
            return Err(err);
        }
        tracing::debug!(
            op = kind,
            operation_id = %id,
            queue_len = self.inner.queue.len(),
            "Operation queued"
        );
        Ok(())
    }

    pub fn queued_len(&self) -> usize {
        self.inner.queue.len()
    }

    /// Identities of queued operations in execution order
    pub fn queued_ids(&self) -> Vec<OperationId> {
        self.inner.queue.ids()
    }

    pub fn contains_operations_of_kind(&self, kind: &str) -> bool {
        self.inner.queue.contains_kind(kind)
    }

    /// Discard queued operations of `kind`; returns how many were removed
    ///
    /// Removed operations are not executed and publish no messages; callers
    /// waiting on them resolve to `Cancelled`.
    pub fn remove_operations_of_kind(&self, kind: &str) -> usize {
        let removed = self.inner.queue.remove_kind(kind);
        if !removed.is_empty() {
            tracing::debug!(op = kind, removed = removed.len(), "Removed queued operations");
        }
        removed.len()
    }
}

impl std::fmt::Debug for CommandService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandService")
            .field("config", &self.inner.config)
            .field("queued", &self.queued_len())
            .field("running", &self.is_running())
            .finish()
    }
}
