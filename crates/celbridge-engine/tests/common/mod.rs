use async_trait::async_trait;
use celbridge_core::{
    EngineMessage, ExError, MessagePublisher, Operation, OperationEntry, OperationFlags,
    OperationResult, WorkspaceCollaborator,
};
use celbridge_engine::{CommandService, EngineConfig};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Shared record of which test operations executed, in execution order
pub type ExecutionLog = Arc<Mutex<Vec<String>>>;

/// Publisher that keeps every message for later inspection
#[derive(Default)]
pub struct RecordingPublisher {
    messages: Mutex<Vec<EngineMessage>>,
}

#[allow(dead_code)]
impl RecordingPublisher {
    pub fn messages(&self) -> Vec<EngineMessage> {
        self.messages.lock().unwrap().clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.messages().iter().map(EngineMessage::name).collect()
    }

    pub fn ended_count(&self) -> usize {
        self.messages()
            .iter()
            .filter(|m| matches!(m, EngineMessage::OperationEnded { .. }))
            .count()
    }

    pub fn registry_requests(&self) -> Vec<bool> {
        self.messages()
            .iter()
            .filter_map(|m| match m {
                EngineMessage::RegistryUpdateRequested { force_immediate } => {
                    Some(*force_immediate)
                }
                _ => None,
            })
            .collect()
    }

    /// Poll until `count` operations have ended; panics after five seconds
    pub async fn wait_for_ended(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.ended_count() < count {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {} ended operations", count));
    }

    /// Poll until at least one operation has started
    pub async fn wait_for_started(&self) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !self
                .messages()
                .iter()
                .any(|m| matches!(m, EngineMessage::OperationStarted { .. }))
            {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("timed out waiting for an operation to start");
    }
}

impl MessagePublisher for RecordingPublisher {
    fn publish(&self, message: EngineMessage) {
        self.messages.lock().unwrap().push(message);
    }
}

/// Workspace that counts flush calls
#[derive(Default)]
pub struct FakeWorkspace {
    pub loaded: AtomicBool,
    pub flushes: AtomicUsize,
    pub deltas: Mutex<Vec<Duration>>,
    /// Panic inside the next flush, once
    pub panic_next_flush: AtomicBool,
}

#[allow(dead_code)]
impl FakeWorkspace {
    pub fn loaded() -> Arc<Self> {
        let workspace = Self::default();
        workspace.loaded.store(true, Ordering::SeqCst);
        Arc::new(workspace)
    }

    pub fn unloaded() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkspaceCollaborator for FakeWorkspace {
    fn is_project_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    async fn advance_and_flush(&self, delta: Duration) -> OperationResult {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        if self.panic_next_flush.swap(false, Ordering::SeqCst) {
            panic!("workspace flush exploded");
        }
        self.deltas.lock().unwrap().push(delta);
        Ok(())
    }
}

/// Tracks how many operations are executing at once
#[allow(dead_code)]
#[derive(Default)]
pub struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

#[allow(dead_code)]
impl InFlight {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

#[allow(dead_code)]
pub enum Outcome {
    Succeed,
    Fail(&'static str),
    Panic(&'static str),
}

/// Configurable operation that appends its label to a shared log
pub struct TestOp {
    kind: &'static str,
    label: String,
    flags: OperationFlags,
    outcome: Outcome,
    delay: Duration,
    target: Option<String>,
    in_flight: Option<Arc<InFlight>>,
    log: ExecutionLog,
}

#[allow(dead_code)]
impl TestOp {
    pub fn new(kind: &'static str, label: &str, log: &ExecutionLog) -> Self {
        Self {
            kind,
            label: label.to_string(),
            flags: OperationFlags::NONE,
            outcome: Outcome::Succeed,
            delay: Duration::ZERO,
            target: None,
            in_flight: None,
            log: log.clone(),
        }
    }

    pub fn with_flags(mut self, flags: OperationFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn failing(mut self, message: &'static str) -> Self {
        self.outcome = Outcome::Fail(message);
        self
    }

    pub fn panicking(mut self, message: &'static str) -> Self {
        self.outcome = Outcome::Panic(message);
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Target path checked by `validate`; an empty path is rejected
    pub fn targeting(mut self, target: &str) -> Self {
        self.target = Some(target.to_string());
        self
    }

    pub fn tracked(mut self, in_flight: &Arc<InFlight>) -> Self {
        self.in_flight = Some(in_flight.clone());
        self
    }

    pub fn entry(self) -> OperationEntry {
        OperationEntry::new(self)
    }
}

#[async_trait]
impl Operation for TestOp {
    fn kind(&self) -> &'static str {
        self.kind
    }

    fn flags(&self) -> OperationFlags {
        self.flags
    }

    fn validate(&self) -> Result<(), String> {
        match &self.target {
            Some(target) if target.trim().is_empty() => Err("target path is empty".to_string()),
            _ => Ok(()),
        }
    }

    async fn execute(&mut self) -> OperationResult {
        if let Some(in_flight) = &self.in_flight {
            in_flight.enter();
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(in_flight) = &self.in_flight {
            in_flight.exit();
        }
        self.log.lock().unwrap().push(self.label.clone());
        match self.outcome {
            Outcome::Succeed => Ok(()),
            Outcome::Fail(message) => Err(ExError::failed(message).with_op(self.kind)),
            Outcome::Panic(message) => panic!("{}", message),
        }
    }
}

#[allow(dead_code)]
pub fn new_log() -> ExecutionLog {
    Arc::new(Mutex::new(Vec::new()))
}

#[allow(dead_code)]
pub fn logged(log: &ExecutionLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Service with a short cycle delay, not yet started
#[allow(dead_code)]
pub fn new_service(workspace: Arc<FakeWorkspace>) -> (CommandService, Arc<RecordingPublisher>) {
    let publisher = Arc::new(RecordingPublisher::default());
    let config = EngineConfig {
        cycle_delay_ms: 5,
        ..EngineConfig::default()
    };
    let service = CommandService::new(config, workspace, publisher.clone()).unwrap();
    (service, publisher)
}
