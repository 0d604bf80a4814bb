//! Post-execution flag processing
//!
//! Registry refresh is requested before the dirty-state notification so that
//! a persistence pass always observes the refreshed registry.

use celbridge_core::messages::{EngineMessage, MessagePublisher};
use celbridge_core::operation::OperationFlags;
use std::sync::Arc;

pub struct FlagProcessor {
    publisher: Arc<dyn MessagePublisher>,
}

impl FlagProcessor {
    pub fn new(publisher: Arc<dyn MessagePublisher>) -> Self {
        Self { publisher }
    }

    /// Publish the messages requested by `flags`
    ///
    /// A forced refresh subsumes a coalesced one: at most one registry
    /// request is published per operation.
    pub fn process(&self, flags: OperationFlags) {
        if flags.contains(OperationFlags::FORCE_REGISTRY_UPDATE) {
            self.publisher
                .publish(EngineMessage::RegistryUpdateRequested {
                    force_immediate: true,
                });
        } else if flags.contains(OperationFlags::REQUEST_REGISTRY_UPDATE) {
            self.publisher
                .publish(EngineMessage::RegistryUpdateRequested {
                    force_immediate: false,
                });
        }

        if flags.contains(OperationFlags::SAVE_WORKSPACE_STATE) {
            self.publisher.publish(EngineMessage::WorkspaceStateDirty);
        }
    }
}
