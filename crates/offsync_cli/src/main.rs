//! offsync CLI
//!
//! Command-line tools for inspecting and repairing a persisted offline queue.
//! Every command works on stored state only; nothing is sent to a backend.
//!
//! # Commands
//!
//! - `status` - Display pending operations and ledger sizes
//! - `conflicts` - List recorded conflicts
//! - `resolve` - Record a conflict resolution
//! - `prune-conflicts` - Drop resolved conflicts
//! - `dead-letters` - List dead-lettered operations
//! - `cancel` - Remove one pending operation
//! - `clear` - Remove every pending operation

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// offsync offline queue tools.
#[derive(Parser)]
#[command(name = "offsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
    #[arg(global = true, short, long, env = "OFFSYNC_PATH")]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display pending operations and ledger sizes
    Status {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List recorded conflicts
    Conflicts {
        /// Only show conflicts without a resolution
        #[arg(short, long)]
        unresolved: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Record how a conflict was resolved
    Resolve {
        /// Operation ID of the conflict
        operation_id: String,

        /// Resolution (keep-local, use-remote, merge)
        resolution: String,
    },

    /// Drop resolved conflicts from the ledger
    PruneConflicts,

    /// List operations that exhausted their retries
    DeadLetters {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Remove one pending operation
    Cancel {
        /// Operation ID
        operation_id: String,
    },

    /// Remove every pending operation
    Clear,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Status { format } => {
            let path = cli.path.ok_or("Store path required for status")?;
            commands::status::run(&path, &format)?;
        }
        Commands::Conflicts { unresolved, format } => {
            let path = cli.path.ok_or("Store path required for conflicts")?;
            commands::conflicts::run(&path, unresolved, &format)?;
        }
        Commands::Resolve {
            operation_id,
            resolution,
        } => {
            let path = cli.path.ok_or("Store path required for resolve")?;
            commands::conflicts::resolve(&path, &operation_id, &resolution)?;
        }
        Commands::PruneConflicts => {
            let path = cli.path.ok_or("Store path required for prune-conflicts")?;
            commands::conflicts::prune(&path)?;
        }
        Commands::DeadLetters { format } => {
            let path = cli.path.ok_or("Store path required for dead-letters")?;
            commands::dead_letters::run(&path, &format)?;
        }
        Commands::Cancel { operation_id } => {
            let path = cli.path.ok_or("Store path required for cancel")?;
            commands::queue::cancel(&path, &operation_id)?;
        }
        Commands::Clear => {
            let path = cli.path.ok_or("Store path required for clear")?;
            commands::queue::clear(&path)?;
        }
        Commands::Version => {
            println!("offsync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
