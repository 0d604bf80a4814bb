use celbridge_core_types::OperationId;
use thiserror::Error;

/// Result type alias using CommandError
pub type Result<T> = std::result::Result<T, CommandError>;

/// Outcome of executing a single operation
///
/// Failures carry a message and an optional chain of nested causes.
pub type OperationResult = std::result::Result<(), ExError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// This taxonomy provides a stable, structured classification of all errors
/// surfaced by the command engine. Each kind maps to a stable error code that
/// can be used for programmatic error handling and testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Submission
    InvalidInput,
    DuplicateOperation,
    NotFound,

    // Execution
    OperationFailed,
    /// The operation faulted (panicked) instead of returning a result
    Panicked,
    /// The operation was discarded before it could execute
    Cancelled,

    // Workspace
    Synchronization,
    Persistence,

    // Integration/IO
    Io,
    Serialization,
    Config,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::DuplicateOperation => "ERR_DUPLICATE_OPERATION",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::OperationFailed => "ERR_OPERATION_FAILED",
            ExErrorKind::Panicked => "ERR_PANICKED",
            ExErrorKind::Cancelled => "ERR_CANCELLED",
            ExErrorKind::Synchronization => "ERR_SYNCHRONIZATION",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Config => "ERR_CONFIG",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// This error type provides a structured representation of failures with
/// classification fields for programmatic handling and a chain of nested
/// causes for aggregating underlying errors.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    operation_id: Option<OperationId>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            operation_id: None,
            message: String::new(),
            source: None,
        }
    }

    /// Shorthand for an operation-reported failure
    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(ExErrorKind::OperationFailed).with_message(message)
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add operation identity context
    pub fn with_operation_id(mut self, id: OperationId) -> Self {
        self.operation_id = Some(id);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Get the operation context, if any
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Get the operation identity context, if any
    pub fn operation_id(&self) -> Option<&OperationId> {
        self.operation_id.as_ref()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the source error, if any
    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }

    /// Iterate the chain of nested causes, nearest first
    pub fn causes(&self) -> impl Iterator<Item = &ExError> {
        std::iter::successors(self.source_error(), |e| e.source_error())
    }

    /// The innermost cause, or `self` when there is no chain
    pub fn root_cause(&self) -> &ExError {
        self.causes().last().unwrap_or(self)
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(id) = &self.operation_id {
            write!(f, " (operation_id: {})", id)?;
        }
        if let Some(source) = &self.source {
            write!(f, "; caused by {}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Submission and setup errors
///
/// These are surfaced synchronously to the caller; the execution loop never
/// observes them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    /// An operation with the same identity is already queued
    #[error("Operation already queued: {operation_id}")]
    DuplicateOperation { operation_id: OperationId },

    /// The operation rejected its own configuration before submission
    #[error("Invalid operation {operation_id}: {reason}")]
    InvalidOperation {
        operation_id: OperationId,
        reason: String,
    },

    /// The factory has no constructor registered for the requested kind
    #[error("Unknown operation kind: {kind}")]
    UnknownOperationKind { kind: String },

    /// Properties could not be applied to a newly constructed operation
    #[error("Invalid properties for operation kind {kind}: {reason}")]
    InvalidProperties { kind: String, reason: String },

    /// Engine configuration is invalid or unreadable
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    /// Serialization error (JSON/TOML encoding/decoding)
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

/// Conversion from CommandError to ExError
impl From<CommandError> for ExError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::DuplicateOperation { operation_id } => {
                ExError::new(ExErrorKind::DuplicateOperation)
                    .with_op("enqueue")
                    .with_operation_id(operation_id)
                    .with_message("Operation already queued")
            }

            CommandError::InvalidOperation {
                operation_id,
                reason,
            } => ExError::new(ExErrorKind::InvalidInput)
                .with_op("validate")
                .with_operation_id(operation_id)
                .with_message(reason),

            CommandError::UnknownOperationKind { kind } => ExError::new(ExErrorKind::NotFound)
                .with_op("create_operation")
                .with_message(format!("Unknown operation kind: {}", kind)),

            CommandError::InvalidProperties { kind, reason } => {
                ExError::new(ExErrorKind::InvalidInput)
                    .with_op("create_operation")
                    .with_message(format!("{}: {}", kind, reason))
            }

            CommandError::Config { reason } => {
                ExError::new(ExErrorKind::Config).with_message(reason)
            }

            CommandError::Serialization { message } => {
                ExError::new(ExErrorKind::Serialization).with_message(message)
            }
        }
    }
}

impl From<serde_json::Error> for CommandError {
    fn from(err: serde_json::Error) -> Self {
        CommandError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for ExError {
    fn from(err: std::io::Error) -> Self {
        ExError::new(ExErrorKind::Io).with_message(err.to_string())
    }
}
