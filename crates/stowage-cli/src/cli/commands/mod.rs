//! CLI command handlers. Each command is in its own file.

mod completions;
mod delete_job;
mod get_bulk;
mod get_object;
mod health;
mod put_bulk;
mod recover;

pub use completions::run_completions;
pub use delete_job::run_delete_job;
pub use get_bulk::{run_get_bulk, GetBulkArgs};
pub use get_object::{run_get_object, GetObjectArgs};
pub use health::run_health;
pub use put_bulk::{run_put_bulk, PutBulkArgs};
pub use recover::{run_recover, RecoverArgs};

use anyhow::{Context, Result};
use std::io::BufRead;

/// Names piped on stdin, one per line; blank lines dropped.
fn read_stdin_names() -> Result<Vec<String>> {
    let stdin = std::io::stdin();
    let mut names = Vec::new();
    for line in stdin.lock().lines() {
        let line = line.context("read names from stdin")?;
        if !line.trim().is_empty() {
            names.push(line);
        }
    }
    Ok(names)
}
