//! Implementation of the `krmfn install` command.

use anyhow::{Context, Result};
use std::path::Path;

pub fn run(state_dir: &Path, name: &str) -> Result<()> {
    let mut manager = crate::open_manager(state_dir)?;

    let entry = manager
        .install(name)
        .with_context(|| format!("failed to install '{name}'"))?;
    manager.persist().context("failed to save state")?;

    println!("Installed KRM function '{}'", entry.qualified_name());
    Ok(())
}
