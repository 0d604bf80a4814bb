//! Operation kinds available to scripts
//!
//! File operations resolve their `path` against the project root and refuse
//! paths that would leave it.

use async_trait::async_trait;
use celbridge_core::{
    CommandError, ExError, ExErrorKind, Operation, OperationFlags, OperationRegistry,
    OperationResult,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

pub const WRITE_FILE: &str = "write_file";
pub const REMOVE_FILE: &str = "remove_file";
pub const SLEEP: &str = "sleep";
pub const FAIL: &str = "fail";

/// Build the registry of script operation kinds rooted at `root`
pub fn registry(root: &Path) -> OperationRegistry {
    let mut registry = OperationRegistry::new();

    let write_root = root.to_path_buf();
    registry.register_with(WRITE_FILE, move |properties| {
        let mut op: WriteFile = from_properties(WRITE_FILE, properties)?;
        op.root = write_root.clone();
        Ok(Box::new(op) as Box<dyn Operation>)
    });

    let remove_root = root.to_path_buf();
    registry.register_with(REMOVE_FILE, move |properties| {
        let mut op: RemoveFile = from_properties(REMOVE_FILE, properties)?;
        op.root = remove_root.clone();
        Ok(Box::new(op) as Box<dyn Operation>)
    });

    registry.register::<Sleep>(SLEEP).register::<Fail>(FAIL);
    registry
}

fn from_properties<T: DeserializeOwned>(
    kind: &str,
    properties: Value,
) -> celbridge_core::Result<T> {
    serde_json::from_value(properties).map_err(|e| CommandError::InvalidProperties {
        kind: kind.to_string(),
        reason: e.to_string(),
    })
}

/// Reject empty, absolute and parent-escaping paths
fn check_relative_path(path: &str) -> Result<(), String> {
    if path.trim().is_empty() {
        return Err("target path is empty".to_string());
    }
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        return Err(format!("target path must be relative: {}", path));
    }
    if candidate
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
    {
        return Err(format!("target path leaves the project: {}", path));
    }
    Ok(())
}

fn io_failure(kind: &'static str, path: &str, err: std::io::Error) -> ExError {
    let error_kind = match err.kind() {
        std::io::ErrorKind::NotFound => ExErrorKind::NotFound,
        _ => ExErrorKind::Io,
    };
    ExError::new(error_kind)
        .with_op(kind)
        .with_message(format!("{}: {}", path, err))
}

/// Create or overwrite a file with the given contents
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WriteFile {
    path: String,
    #[serde(default)]
    contents: String,
    #[serde(skip)]
    root: PathBuf,
}

#[async_trait]
impl Operation for WriteFile {
    fn kind(&self) -> &'static str {
        WRITE_FILE
    }

    fn flags(&self) -> OperationFlags {
        OperationFlags::REQUEST_REGISTRY_UPDATE | OperationFlags::SAVE_WORKSPACE_STATE
    }

    fn validate(&self) -> Result<(), String> {
        check_relative_path(&self.path)
    }

    fn properties(&self) -> Value {
        json!({ "path": self.path, "bytes": self.contents.len() })
    }

    async fn execute(&mut self) -> OperationResult {
        let target = self.root.join(&self.path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_failure(WRITE_FILE, &self.path, e))?;
        }
        tokio::fs::write(&target, self.contents.as_bytes())
            .await
            .map_err(|e| io_failure(WRITE_FILE, &self.path, e))
    }
}

/// Delete a file; a missing file is a failure
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoveFile {
    path: String,
    #[serde(skip)]
    root: PathBuf,
}

#[async_trait]
impl Operation for RemoveFile {
    fn kind(&self) -> &'static str {
        REMOVE_FILE
    }

    fn flags(&self) -> OperationFlags {
        OperationFlags::FORCE_REGISTRY_UPDATE | OperationFlags::SAVE_WORKSPACE_STATE
    }

    fn validate(&self) -> Result<(), String> {
        check_relative_path(&self.path)
    }

    fn properties(&self) -> Value {
        json!({ "path": self.path })
    }

    async fn execute(&mut self) -> OperationResult {
        tokio::fs::remove_file(self.root.join(&self.path))
            .await
            .map_err(|e| io_failure(REMOVE_FILE, &self.path, e))
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Sleep {
    millis: u64,
}

#[async_trait]
impl Operation for Sleep {
    fn kind(&self) -> &'static str {
        SLEEP
    }

    fn properties(&self) -> Value {
        json!({ "millis": self.millis })
    }

    async fn execute(&mut self) -> OperationResult {
        tokio::time::sleep(Duration::from_millis(self.millis)).await;
        Ok(())
    }
}

/// Always fails; used to exercise failure reporting
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Fail {
    #[serde(default = "default_fail_message")]
    message: String,
}

fn default_fail_message() -> String {
    "scripted failure".to_string()
}

#[async_trait]
impl Operation for Fail {
    fn kind(&self) -> &'static str {
        FAIL
    }

    fn properties(&self) -> Value {
        json!({ "message": self.message })
    }

    async fn execute(&mut self) -> OperationResult {
        Err(ExError::failed(self.message.clone()).with_op(FAIL))
    }
}
