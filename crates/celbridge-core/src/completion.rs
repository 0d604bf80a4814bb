//! Completion bridge
//!
//! A one-shot, single-resolution synchronization point used by the
//! "enqueue and await" submission mode.

use crate::errors::{ExError, ExErrorKind, OperationResult};
use celbridge_core_types::OperationId;
use tokio::sync::oneshot;

/// Sending half, attached to the operation entry
#[derive(Debug)]
pub struct CompletionSender {
    sender: oneshot::Sender<OperationResult>,
}

impl CompletionSender {
    /// Deliver the result. Returns false if the waiting caller has gone away.
    pub fn resolve(self, result: OperationResult) -> bool {
        self.sender.send(result).is_ok()
    }
}

/// Receiving half, held by the waiting caller
#[derive(Debug)]
pub struct CompletionBridge {
    operation_id: OperationId,
    receiver: oneshot::Receiver<OperationResult>,
}

impl CompletionBridge {
    pub fn new(operation_id: OperationId) -> (CompletionSender, Self) {
        let (sender, receiver) = oneshot::channel();
        (
            CompletionSender { sender },
            Self {
                operation_id,
                receiver,
            },
        )
    }

    pub fn operation_id(&self) -> &OperationId {
        &self.operation_id
    }

    /// Suspend until the operation has finished
    ///
    /// If the sender is dropped without resolving (the operation was
    /// discarded before execution) this yields a `Cancelled` failure.
    pub async fn wait(self) -> OperationResult {
        match self.receiver.await {
            Ok(result) => result,
            Err(_) => Err(ExError::new(ExErrorKind::Cancelled)
                .with_operation_id(self.operation_id)
                .with_message("Operation was discarded before it executed")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bridge_delivers_success() {
        let (sender, bridge) = CompletionBridge::new(OperationId::new());
        assert!(sender.resolve(Ok(())));
        assert!(bridge.wait().await.is_ok());
    }

    #[tokio::test]
    async fn test_bridge_delivers_failure_unchanged() {
        let (sender, bridge) = CompletionBridge::new(OperationId::new());
        sender.resolve(Err(ExError::failed("copy failed")));

        let err = bridge.wait().await.unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::OperationFailed);
        assert_eq!(err.message(), "copy failed");
    }

    #[tokio::test]
    async fn test_dropped_sender_resolves_cancelled() {
        let id = OperationId::new();
        let (sender, bridge) = CompletionBridge::new(id.clone());
        drop(sender);

        let err = bridge.wait().await.unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::Cancelled);
        assert_eq!(err.operation_id(), Some(&id));
    }

    #[test]
    fn test_resolve_after_caller_gone_reports_false() {
        let (sender, bridge) = CompletionBridge::new(OperationId::new());
        drop(bridge);
        assert!(!sender.resolve(Ok(())));
    }
}
