//! Status command implementation.

use super::open;
use offsync_engine::{OperationSummary, QueueStatus};
use serde::Serialize;
use std::path::Path;

/// Store status.
#[derive(Debug, Serialize)]
pub struct StatusResult {
    /// Store path.
    pub path: String,
    /// Operations in the queue.
    pub pending_count: usize,
    /// Queued operations that exhausted their retries.
    pub exhausted_count: usize,
    /// Recorded conflicts.
    pub conflict_count: usize,
    /// Conflicts without a resolution.
    pub unresolved_count: usize,
    /// Dead-lettered operations.
    pub dead_letter_count: usize,
    /// Queue contents in dispatch order.
    pub operations: Vec<OperationSummary>,
}

/// Collects the status of the store at `path`.
pub fn collect(path: &Path) -> Result<StatusResult, Box<dyn std::error::Error>> {
    let stores = open(path)?;
    let status = QueueStatus::from_queue(&stores.queue.load(), false, false);

    Ok(StatusResult {
        path: path.display().to_string(),
        pending_count: status.pending_count,
        exhausted_count: status.exhausted_count(),
        conflict_count: stores.conflicts.len(),
        unresolved_count: stores.conflicts.unresolved().len(),
        dead_letter_count: stores.dead_letters.len(),
        operations: status.operations,
    })
}

/// Runs the status command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = collect(path)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn print_text_output(result: &StatusResult) {
    println!("offsync Queue Status");
    println!("====================");
    println!();
    println!("Path: {}", result.path);
    println!();
    println!("Queue:");
    println!("  Pending:    {}", result.pending_count);
    println!("  Exhausted:  {}", result.exhausted_count);
    println!();
    println!("Ledgers:");
    println!(
        "  Conflicts:    {} ({} unresolved)",
        result.conflict_count, result.unresolved_count
    );
    println!("  Dead letters: {}", result.dead_letter_count);

    if !result.operations.is_empty() {
        println!();
        println!("Operations:");
        for op in &result.operations {
            print!(
                "  [{}] {} {}/{} attempts {}/{}",
                op.priority, op.id, op.resource, op.action, op.attempts, op.max_attempts
            );
            match &op.last_error {
                Some(error) => println!(" - {error}"),
                None => println!(),
            }
        }
    }
}
