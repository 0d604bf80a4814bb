//! Script run command
//!
//! Usage: celbridge run <SCRIPT> [--project <DIR>] [--config <FILE>]
//!        [--cycle-delay-ms <N>] [--log-profile dev|prod]

use crate::operations;
use crate::project::ProjectWorkspace;
use crate::script::{Script, SubmitMode};
use async_trait::async_trait;
use celbridge_core::logging_facility::{self, Profile};
use celbridge_core::{
    BroadcastPublisher, EngineMessage, NoWorkspace, Operation, OperationEntry, OperationResult,
    WorkspaceCollaborator,
};
use celbridge_engine::{CommandService, EngineConfig};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};

const DRAIN: &str = "drain";

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Path to the operation script (TOML)
    pub script: PathBuf,

    /// Project directory; file paths resolve against it and workspace state is
    /// saved under it. Defaults to the current directory, without state.
    #[arg(long)]
    pub project: Option<PathBuf>,

    /// Engine configuration file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the pause between execution loop cycles
    #[arg(long)]
    pub cycle_delay_ms: Option<u64>,

    /// Logging profile: dev or prod
    #[arg(long, default_value = "dev")]
    pub log_profile: Profile,
}

/// Execute run command
pub fn execute(args: RunArgs) -> anyhow::Result<()> {
    logging_facility::init(args.log_profile);

    let config = load_config(&args)?;
    let script = Script::load(&args.script)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let failed = runtime.block_on(run_script(config, script, args.project))?;

    if failed > 0 {
        anyhow::bail!("{} operation(s) failed", failed);
    }
    Ok(())
}

fn load_config(args: &RunArgs) -> anyhow::Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(cycle_delay_ms) = args.cycle_delay_ms {
        config.cycle_delay_ms = cycle_delay_ms;
    }
    config.validate()?;
    Ok(config)
}

/// Run every step and return how many reported a failure
async fn run_script(
    config: EngineConfig,
    script: Script,
    project: Option<PathBuf>,
) -> anyhow::Result<usize> {
    let project = project.map(ProjectWorkspace::open).transpose()?.map(Arc::new);
    let root = match &project {
        Some(project) => project.root().to_path_buf(),
        None => std::env::current_dir()?,
    };

    // Build everything up front so a bad script runs nothing
    let entries = script.entries(&operations::registry(&root))?;
    let total = entries.len();

    let publisher = BroadcastPublisher::new(config.message_capacity);
    let printer = tokio::spawn(print_messages(publisher.subscribe(), project.clone()));
    let workspace: Arc<dyn WorkspaceCollaborator> = match &project {
        Some(project) => project.clone(),
        None => Arc::new(NoWorkspace),
    };

    let service = CommandService::new(config, workspace, Arc::new(publisher))?;
    service.start();

    let mut failed = 0;
    for (index, (mode, entry)) in entries.into_iter().enumerate() {
        let kind = entry.kind();
        let result = match mode {
            SubmitMode::Wait => service.execute_and_wait(entry).await,
            SubmitMode::Immediate => service.execute_immediate(entry).await,
            SubmitMode::Enqueue => service.enqueue(entry).map_err(Into::into),
        };
        if let Err(err) = result {
            failed += 1;
            eprintln!("step {} ({}) failed: {}", index + 1, kind, err);
        }
    }

    // Queue order guarantees every enqueued step has run once this resolves
    if let Err(err) = service.execute_and_wait(OperationEntry::new(Drain)).await {
        tracing::warn!(error = %err, "Queue drain did not complete");
    }
    service.stop().await;

    // Dropping the last publisher handle closes the channel and ends the printer
    drop(service);
    printer.await?;

    if let Some(project) = &project {
        project.save_if_dirty().await?;
    }

    println!("{} operation(s) run, {} failed", total, failed);
    Ok(failed)
}

async fn print_messages(
    mut receiver: broadcast::Receiver<EngineMessage>,
    project: Option<Arc<ProjectWorkspace>>,
) {
    loop {
        match receiver.recv().await {
            Ok(message) => {
                if message == EngineMessage::WorkspaceStateDirty {
                    if let Some(project) = &project {
                        project.mark_dirty();
                    }
                }
                if let Some(line) = describe(&message) {
                    println!("{}", line);
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped = skipped, "Message printer fell behind");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn describe(message: &EngineMessage) -> Option<String> {
    match message {
        EngineMessage::OperationStarted {
            operation,
            elapsed_secs,
        } if operation.kind != DRAIN => Some(format!(
            "[{:.3}s] started {} ({})",
            elapsed_secs, operation.kind, operation.id
        )),
        EngineMessage::OperationEnded {
            operation,
            elapsed_secs,
        } if operation.kind != DRAIN => Some(format!(
            "[{:.3}s] ended {} ({})",
            elapsed_secs, operation.kind, operation.id
        )),
        EngineMessage::RegistryUpdateRequested { force_immediate } => Some(if *force_immediate {
            "registry refresh requested (immediate)".to_string()
        } else {
            "registry refresh requested".to_string()
        }),
        EngineMessage::WorkspaceStateDirty => Some("workspace state dirty".to_string()),
        _ => None,
    }
}

/// Barrier queued after the script's own steps
struct Drain;

#[async_trait]
impl Operation for Drain {
    fn kind(&self) -> &'static str {
        DRAIN
    }

    async fn execute(&mut self) -> OperationResult {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use celbridge_core::{OperationId, OperationSummary};

    fn summary(kind: &'static str) -> OperationSummary {
        OperationSummary {
            id: OperationId::from_string("op-1".to_string()),
            kind,
            provenance: None,
        }
    }

    #[test]
    fn test_describe_lifecycle() {
        let line = describe(&EngineMessage::OperationStarted {
            operation: summary("write_file"),
            elapsed_secs: 0.25,
        });
        assert_eq!(line.as_deref(), Some("[0.250s] started write_file (op-1)"));
    }

    #[test]
    fn test_describe_hides_drain() {
        let line = describe(&EngineMessage::OperationEnded {
            operation: summary(DRAIN),
            elapsed_secs: 1.0,
        });
        assert!(line.is_none());
    }

    #[test]
    fn test_describe_refresh_requests() {
        assert_eq!(
            describe(&EngineMessage::RegistryUpdateRequested {
                force_immediate: true
            })
            .as_deref(),
            Some("registry refresh requested (immediate)")
        );
    }

    #[test]
    fn test_cli_delay_overrides_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        std::fs::write(&path, "cycle_delay_ms = 40\n").unwrap();
        let args = RunArgs {
            script: PathBuf::from("script.toml"),
            project: None,
            config: Some(path),
            cycle_delay_ms: Some(3),
            log_profile: Profile::Test,
        };

        let config = load_config(&args).unwrap();

        assert_eq!(config.cycle_delay_ms, 3);
    }

    #[test]
    fn test_zero_cycle_delay_rejected() {
        let args = RunArgs {
            script: PathBuf::from("script.toml"),
            project: None,
            config: None,
            cycle_delay_ms: Some(0),
            log_profile: Profile::Test,
        };

        assert!(load_config(&args).is_err());
    }
}
