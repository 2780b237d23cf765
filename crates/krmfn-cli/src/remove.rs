//! Implementation of the `krmfn remove` command.

use anyhow::{Context, Result};
use std::path::Path;

pub fn run(state_dir: &Path, name: &str) -> Result<()> {
    let mut manager = crate::open_manager(state_dir)?;

    let removed = manager
        .remove(name)
        .with_context(|| format!("failed to remove '{name}'"))?;
    manager.persist().context("failed to save state")?;

    println!("Removed KRM function '{}'", removed.qualified_name());
    Ok(())
}
