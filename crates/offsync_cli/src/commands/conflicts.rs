//! Conflict commands.

use super::{format_millis, open, CliError};
use offsync_protocol::{ConflictResolution, SyncConflict};
use std::path::Path;
use tracing::info;

/// Returns the recorded conflicts, optionally only the unresolved ones.
pub fn collect(
    path: &Path,
    unresolved_only: bool,
) -> Result<Vec<SyncConflict>, Box<dyn std::error::Error>> {
    let stores = open(path)?;
    Ok(if unresolved_only {
        stores.conflicts.unresolved()
    } else {
        stores.conflicts.all()
    })
}

/// Runs the conflicts command.
pub fn run(path: &Path, unresolved_only: bool, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let conflicts = collect(path, unresolved_only)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&conflicts)?);
        }
        _ => {
            if conflicts.is_empty() {
                println!("No conflicts.");
            }
            for conflict in &conflicts {
                let resolution = conflict
                    .resolution
                    .map_or("unresolved", |r| r.as_str());
                println!(
                    "{}  {}  detected {}  {}",
                    conflict.operation_id,
                    conflict.reason,
                    format_millis(conflict.detected_at),
                    resolution
                );
            }
        }
    }

    Ok(())
}

/// Records a resolution for the oldest unresolved conflict of an operation.
pub fn resolve(
    path: &Path,
    operation_id: &str,
    resolution: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let resolution: ConflictResolution = resolution
        .parse()
        .map_err(|_| CliError::InvalidArgument(format!("unknown resolution '{resolution}'")))?;

    let stores = open(path)?;
    if !stores.conflicts.resolve(operation_id, resolution) {
        return Err(CliError::NotFound {
            kind: "unresolved conflict",
            id: operation_id.to_string(),
        }
        .into());
    }

    info!(operation_id, resolution = %resolution, "conflict resolved");
    println!("Resolved {operation_id} as {resolution}");
    Ok(())
}

/// Drops resolved conflicts.
pub fn prune(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let stores = open(path)?;
    let pruned = stores.conflicts.prune_resolved();
    println!("Pruned {pruned} resolved conflict(s)");
    Ok(())
}
