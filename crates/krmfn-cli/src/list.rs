//! Implementation of the `krmfn list` command.

use anyhow::{Context, Result};
use std::path::Path;

pub fn run(state_dir: &Path) -> Result<()> {
    let mut manager = crate::open_manager(state_dir)?;

    let installed = manager.installed_catalog();
    manager.persist().context("failed to save state")?;

    print!("{}", serde_yaml::to_string(&installed)?);
    Ok(())
}
