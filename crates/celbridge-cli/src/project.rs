//! Directory-backed project workspace
//!
//! Workspace state lives in `.celbridge/workspace.json` under the project
//! root. It is rewritten on the next flush after the state is marked dirty.

use anyhow::Context;
use async_trait::async_trait;
use celbridge_core::{ExError, ExErrorKind, OperationResult, WorkspaceCollaborator};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

pub const STATE_DIR: &str = ".celbridge";
pub const STATE_FILE: &str = "workspace.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkspaceState {
    pub saved_at: DateTime<Utc>,
    pub save_count: u64,
    /// Time the engine has spent advancing this workspace, across runs
    pub active_secs: f64,
}

#[derive(Debug, Default)]
struct Pending {
    dirty: bool,
    save_count: u64,
    active: Duration,
}

#[derive(Debug)]
pub struct ProjectWorkspace {
    root: PathBuf,
    pending: Mutex<Pending>,
}

impl ProjectWorkspace {
    /// Open the project at `root`, picking up any existing state file
    pub fn open(root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            anyhow::bail!("project directory not found: {}", root.display());
        }

        let mut pending = Pending::default();
        let state_path = root.join(STATE_DIR).join(STATE_FILE);
        if state_path.exists() {
            let source = std::fs::read_to_string(&state_path)
                .with_context(|| format!("reading {}", state_path.display()))?;
            let state: WorkspaceState = serde_json::from_str(&source)
                .with_context(|| format!("parsing {}", state_path.display()))?;
            pending.save_count = state.save_count;
            pending.active = Duration::from_secs_f64(state.active_secs.max(0.0));
        }

        tracing::info!(root = %root.display(), saves = pending.save_count, "Project loaded");
        Ok(Self {
            root,
            pending: Mutex::new(pending),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state_path(&self) -> PathBuf {
        self.root.join(STATE_DIR).join(STATE_FILE)
    }

    pub fn mark_dirty(&self) {
        self.pending().dirty = true;
    }

    fn pending(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write the state file if anything marked the workspace dirty
    ///
    /// # Errors
    ///
    /// Returns a `Persistence` error if the file cannot be written; the
    /// workspace stays dirty so the next flush retries.
    pub async fn save_if_dirty(&self) -> OperationResult {
        let state = {
            let mut pending = self.pending();
            if !pending.dirty {
                return Ok(());
            }
            pending.dirty = false;
            WorkspaceState {
                saved_at: Utc::now(),
                save_count: pending.save_count + 1,
                active_secs: pending.active.as_secs_f64(),
            }
        };

        match self.write_state(&state).await {
            Ok(()) => {
                self.pending().save_count = state.save_count;
                tracing::debug!(save_count = state.save_count, "Workspace state saved");
                Ok(())
            }
            Err(err) => {
                self.mark_dirty();
                Err(err)
            }
        }
    }

    async fn write_state(&self, state: &WorkspaceState) -> OperationResult {
        let path = self.state_path();
        let persistence = |message: String| {
            ExError::new(ExErrorKind::Persistence)
                .with_op("save_workspace_state")
                .with_message(message)
        };

        let json = serde_json::to_string_pretty(state).map_err(|e| persistence(e.to_string()))?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| persistence(format!("{}: {}", parent.display(), e)))?;
        }
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| persistence(format!("{}: {}", path.display(), e)))
    }
}

#[async_trait]
impl WorkspaceCollaborator for ProjectWorkspace {
    fn is_project_loaded(&self) -> bool {
        true
    }

    async fn advance_and_flush(&self, delta: Duration) -> OperationResult {
        self.pending().active += delta;
        self.save_if_dirty().await
    }
}
