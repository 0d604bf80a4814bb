//! Lifecycle and side-effect messages published by the engine
//!
//! Subscribers are external; the engine only relies on the publish contract.

use crate::operation::OperationSummary;
use tokio::sync::broadcast;

/// Messages the engine publishes to collaborators
#[derive(Debug, Clone, PartialEq)]
pub enum EngineMessage {
    /// An operation taken from the queue is about to execute
    OperationStarted {
        operation: OperationSummary,
        elapsed_secs: f64,
    },
    /// A queued operation finished (successfully or not)
    OperationEnded {
        operation: OperationSummary,
        elapsed_secs: f64,
    },
    /// The resource registry should be refreshed; coalesced unless forced
    RegistryUpdateRequested { force_immediate: bool },
    /// Workspace state changed and should be persisted
    WorkspaceStateDirty,
}

impl EngineMessage {
    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            EngineMessage::OperationStarted { .. } => "operation_started",
            EngineMessage::OperationEnded { .. } => "operation_ended",
            EngineMessage::RegistryUpdateRequested { .. } => "registry_update_requested",
            EngineMessage::WorkspaceStateDirty => "workspace_state_dirty",
        }
    }
}

/// Publish side of the notification bus
pub trait MessagePublisher: Send + Sync {
    fn publish(&self, message: EngineMessage);
}

/// Publisher backed by a tokio broadcast channel
///
/// Publishing with no subscribers is not an error; slow subscribers may
/// observe `Lagged` once the channel capacity is exceeded.
#[derive(Debug, Clone)]
pub struct BroadcastPublisher {
    sender: broadcast::Sender<EngineMessage>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineMessage> {
        self.sender.subscribe()
    }
}

impl MessagePublisher for BroadcastPublisher {
    fn publish(&self, message: EngineMessage) {
        if self.sender.send(message).is_err() {
            tracing::trace!("No subscribers for engine message");
        }
    }
}
