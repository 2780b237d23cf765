//! Implementation of the `krmfn search` command.

use anyhow::{Context, Result};
use std::path::Path;

pub fn run(state_dir: &Path, name: &str) -> Result<()> {
    let mut manager = crate::open_manager(state_dir)?;

    let results = manager.search(name);
    manager.persist().context("failed to save state")?;

    print!("{}", serde_yaml::to_string(&results)?);
    Ok(())
}
