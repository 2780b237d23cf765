//! krmfn CLI - a local package manager for KRM function manifests.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use krmfn_core::{find_state_dir, FunctionManager};
use std::path::Path;

mod config;
mod install;
mod list;
mod remove;
mod search;
mod update;

#[derive(Parser)]
#[command(name = "krmfn")]
#[command(version)]
#[command(about = "A local package manager for KRM function manifests", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Edit the krmfn configuration
    Config {
        #[command(subcommand)]
        command: config::ConfigCommand,
    },

    /// Search the managed catalogs for a function and install it
    Install {
        /// Function name, `group/name` with an optional `@version` suffix
        name: String,
    },

    /// Remove an installed function
    Remove {
        /// Function name, `group/name`
        name: String,
    },

    /// Search the managed catalogs for functions matching a name
    Search {
        /// Substring to match against qualified function names
        name: String,
    },

    /// Print the catalog of installed functions
    List,

    /// Update all catalogs and all unpinned functions
    Update,

    /// Print the version number of krmfn
    Version,
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("krmfn encountered an error.\n{err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    if matches!(cli.command, Commands::Version) {
        println!("krmfn version {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let state_dir = find_state_dir().context("failed to locate the state directory")?;
    match cli.command {
        Commands::Config { command } => config::run(&state_dir, &command),
        Commands::Install { name } => install::run(&state_dir, &name),
        Commands::Remove { name } => remove::run(&state_dir, &name),
        Commands::Search { name } => search::run(&state_dir, &name),
        Commands::List => list::run(&state_dir),
        Commands::Update => update::run(&state_dir),
        Commands::Version => unreachable!("handled above"),
    }
}

/// Open the function manager for a state directory, printing any startup
/// warnings to stderr.
pub(crate) fn open_manager(state_dir: &Path) -> Result<FunctionManager> {
    let mut manager = FunctionManager::open(state_dir)
        .with_context(|| format!("failed to open state directory {}", state_dir.display()))?;
    for warning in manager.take_warnings() {
        eprintln!("warning: {warning}");
    }
    Ok(manager)
}
