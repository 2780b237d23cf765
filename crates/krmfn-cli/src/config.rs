//! Implementation of the `krmfn config` subcommands.

use anyhow::{Context, Result};
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Add a catalog to the list of managed catalogs
    AddCatalog {
        /// Catalog URI, `file:` or HTTP(S)
        uri: String,
    },

    /// Remove a catalog from the list of managed catalogs
    RemoveCatalog {
        /// Catalog URI as listed by `krmfn config list`
        uri: String,
    },

    /// Print the current configuration
    List,
}

pub fn run(state_dir: &Path, command: &ConfigCommand) -> Result<()> {
    let mut manager = crate::open_manager(state_dir)?;

    match command {
        ConfigCommand::AddCatalog { uri } => {
            manager
                .catalogs_mut()
                .add_from_uri(uri)
                .with_context(|| format!("failed to add catalog '{uri}'"))?;
            manager.persist().context("failed to save state")?;
            println!("Added catalog '{uri}'");
        }
        ConfigCommand::RemoveCatalog { uri } => {
            manager
                .catalogs_mut()
                .remove(uri)
                .with_context(|| format!("failed to remove catalog '{uri}'"))?;
            manager.persist().context("failed to save state")?;
            println!("Removed catalog '{uri}'");
        }
        ConfigCommand::List => {
            let config = manager.derived_config();
            manager.persist().context("failed to save state")?;
            print!("{}", serde_yaml::to_string(&config)?);
        }
    }

    Ok(())
}
