//! Implementation of the `krmfn update` command.
//!
//! Catalogs are refreshed first, then every unpinned installed function
//! is re-resolved against the refreshed index. Per-item failures are
//! reported and skipped; the sweep itself always completes and persists.

use anyhow::{Context, Result};
use std::path::Path;

pub fn run(state_dir: &Path) -> Result<()> {
    let mut manager = crate::open_manager(state_dir)?;

    for (uri, result) in manager.catalogs_mut().update_all() {
        if let Err(err) = result {
            eprintln!("warning: failed to update catalog '{uri}': {err}");
        }
    }

    for (name, result) in manager.update_all() {
        if let Err(err) = result {
            eprintln!("warning: failed to update function '{name}': {err}");
        }
    }

    manager.persist().context("failed to save state")?;

    println!("Updated catalogs and functions");
    Ok(())
}
