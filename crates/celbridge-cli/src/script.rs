//! Operation scripts
//!
//! A script is a TOML document listing operations in execution order:
//!
//! ```toml
//! [[operations]]
//! kind = "write_file"
//! path = "notes/today.md"
//! contents = "hello"
//!
//! [[operations]]
//! kind = "sleep"
//! mode = "enqueue"
//! millis = 20
//! ```
//!
//! Every key other than `kind` and `mode` is passed to the operation as a
//! property.

use anyhow::Context;
use celbridge_core::{OperationEntry, OperationFactory};
use serde::Deserialize;
use std::path::Path;

/// How a step is handed to the engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitMode {
    /// Queue and wait for the result before submitting the next step
    #[default]
    Wait,
    /// Queue without waiting; failures are only logged
    Enqueue,
    /// Execute on the caller, bypassing the queue
    Immediate,
}

#[derive(Debug, Deserialize)]
pub struct Step {
    pub kind: String,
    #[serde(default)]
    pub mode: SubmitMode,
    #[serde(flatten)]
    pub properties: toml::Table,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Script {
    #[serde(default)]
    pub operations: Vec<Step>,
}

impl Script {
    pub fn parse(source: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("reading script {}", path.display()))?;
        Self::parse(&source).with_context(|| format!("parsing script {}", path.display()))
    }

    /// Build and validate an entry for every step, failing on the first step
    /// that cannot be built
    pub fn entries(
        &self,
        factory: &dyn OperationFactory,
    ) -> anyhow::Result<Vec<(SubmitMode, OperationEntry)>> {
        self.operations
            .iter()
            .enumerate()
            .map(|(index, step)| -> anyhow::Result<(SubmitMode, OperationEntry)> {
                let properties = serde_json::to_value(&step.properties)?;
                let step_name = || format!("step {} ({})", index + 1, step.kind);
                let entry = factory
                    .create_entry(&step.kind, properties)
                    .with_context(step_name)?;
                entry.validate().with_context(step_name)?;
                Ok((step.mode, entry))
            })
            .collect()
    }
}
