//! Dead-letters command implementation.

use super::{format_millis, open};
use std::path::Path;

/// Runs the dead-letters command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let letters = open(path)?.dead_letters.all();

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&letters)?);
        }
        _ => {
            if letters.is_empty() {
                println!("No dead letters.");
            }
            for letter in &letters {
                println!(
                    "{}  {}  after {} attempt(s) at {}: {}",
                    letter.operation_id(),
                    letter.operation.action,
                    letter.operation.attempts,
                    format_millis(letter.dead_lettered_at),
                    letter.reason
                );
            }
        }
    }

    Ok(())
}
