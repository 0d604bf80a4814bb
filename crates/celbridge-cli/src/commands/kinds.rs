//! Kind listing command
//!
//! Usage: celbridge kinds

use crate::operations;
use std::path::Path;

/// Print every registered operation kind, one per line
pub fn execute() -> anyhow::Result<()> {
    let registry = operations::registry(Path::new("."));
    for kind in registry.kinds() {
        println!("{}", kind);
    }
    Ok(())
}
