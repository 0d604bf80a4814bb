//! The execution loop
//!
//! One long-lived task is the sole consumer of the queue and the sole driver
//! of workspace synchronization. Each cycle: synchronize, dequeue, execute,
//! post-process, then pause for the configured delay.

use crate::flag_processor::FlagProcessor;
use crate::synchronizer::WorkspaceSynchronizer;
use celbridge_core::errors::{ExError, ExErrorKind, OperationResult};
use celbridge_core::messages::{EngineMessage, MessagePublisher};
use celbridge_core::operation::{OperationEntry, OperationSummary};
use celbridge_core::queue::OperationQueue;
use celbridge_core::{log_op_end, log_op_error, log_op_start};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

pub(crate) struct ExecutionLoop {
    queue: Arc<OperationQueue>,
    synchronizer: WorkspaceSynchronizer,
    flags: FlagProcessor,
    publisher: Arc<dyn MessagePublisher>,
    cycle_delay: Duration,
    /// Stop signal owned by this run; a dropped sender also means stop
    stop: watch::Receiver<bool>,
    started_at: Instant,
    last_synchronized: Option<Instant>,
}

impl ExecutionLoop {
    pub(crate) fn new(
        queue: Arc<OperationQueue>,
        synchronizer: WorkspaceSynchronizer,
        publisher: Arc<dyn MessagePublisher>,
        cycle_delay: Duration,
        stop: watch::Receiver<bool>,
    ) -> Self {
        Self {
            queue,
            synchronizer,
            flags: FlagProcessor::new(publisher.clone()),
            publisher,
            cycle_delay,
            stop,
            started_at: Instant::now(),
            last_synchronized: None,
        }
    }

    /// Run until this run's stop signal is raised
    ///
    /// On stop, everything still queued is discarded without executing.
    pub(crate) async fn run(mut self) {
        tracing::info!(
            cycle_delay_ms = self.cycle_delay.as_millis() as u64,
            "Execution loop started"
        );

        loop {
            if self.stop_requested() {
                let discarded = self.queue.clear();
                tracing::info!(
                    discarded = discarded.len(),
                    "Execution loop stopped, pending operations discarded"
                );
                break;
            }

            self.run_cycle().await;

            tokio::select! {
                _ = tokio::time::sleep(self.cycle_delay) => {}
                _ = self.stop.changed() => {}
            }
        }
    }

    fn stop_requested(&self) -> bool {
        *self.stop.borrow() || self.stop.has_changed().is_err()
    }

    /// One synchronize / dequeue / execute / post-process pass
    ///
    /// Returns the summary of the operation executed, if there was one.
    pub(crate) async fn run_cycle(&mut self) -> Option<OperationSummary> {
        self.synchronize_workspace().await;

        let entry = self.queue.pop_front()?;
        Some(self.execute_entry(entry).await)
    }

    async fn synchronize_workspace(&mut self) {
        // The first cycle has no valid delta, it only records the baseline
        if let Some(last) = self.last_synchronized {
            let delta = last.elapsed();
            let outcome = AssertUnwindSafe(self.synchronizer.synchronize(delta))
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| {
                    Err(ExError::new(ExErrorKind::Synchronization)
                        .with_op("synchronize_workspace")
                        .with_message(format!(
                            "Workspace panicked: {}",
                            panic_message(payload.as_ref())
                        )))
                });
            if let Err(err) = outcome {
                tracing::error!(
                    err_kind = ?err.kind(),
                    err_code = err.code(),
                    error = %err,
                    "Workspace synchronization failed"
                );
            }
        }
        // Taken after the call so time spent flushing is not counted twice
        self.last_synchronized = Some(Instant::now());
    }

    async fn execute_entry(&mut self, mut entry: OperationEntry) -> OperationSummary {
        let summary = entry.summary();
        let kind = summary.kind;

        tracing::debug!(
            op = kind,
            operation_id = %summary.id,
            properties = %entry.properties(),
            "Executing operation"
        );
        self.publisher.publish(EngineMessage::OperationStarted {
            operation: summary.clone(),
            elapsed_secs: self.elapsed_secs(),
        });
        log_op_start!(
            kind,
            operation_id = %summary.id,
            provenance = summary.provenance.as_ref().map(|p| p.as_str()).unwrap_or("unknown")
        );

        let started = Instant::now();
        let result = self.execute_guarded(&mut entry, &summary).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(()) => {
                log_op_end!(kind, duration_ms = duration_ms, operation_id = %summary.id);
            }
            Err(err) => {
                log_op_error!(
                    kind,
                    err.clone(),
                    duration_ms = duration_ms,
                    operation_id = %summary.id
                );
            }
        }

        if let Some(completion) = entry.take_completion() {
            if !completion.resolve(result) {
                tracing::debug!(operation_id = %summary.id, "Waiting caller went away");
            }
        }

        self.flags.process(entry.flags());

        self.publisher.publish(EngineMessage::OperationEnded {
            operation: summary.clone(),
            elapsed_secs: self.elapsed_secs(),
        });

        summary
    }

    /// Execute, converting a panic into a `Panicked` failure
    async fn execute_guarded(
        &self,
        entry: &mut OperationEntry,
        summary: &OperationSummary,
    ) -> OperationResult {
        match AssertUnwindSafe(entry.execute()).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(
                    op = summary.kind,
                    operation_id = %summary.id,
                    panic = %message,
                    "Operation faulted during execution"
                );
                Err(ExError::new(ExErrorKind::Panicked)
                    .with_op(summary.kind)
                    .with_operation_id(summary.id.clone())
                    .with_message(message))
            }
        }
    }

    fn elapsed_secs(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "operation panicked".to_string()
    }
}
