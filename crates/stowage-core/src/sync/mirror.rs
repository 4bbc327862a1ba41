//! Mirror semantics for directory GET: local files whose remote object is gone.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::names;

/// Local files under `root` whose object name is in prefix scope but absent
/// from `remote_names`. Nothing is deleted here.
pub fn mirror_delete_set(
    root: &Path,
    remote_names: &HashSet<String>,
    prefixes: &[String],
) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    if !root.exists() {
        return Ok(out);
    }
    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let Some(name) = names::object_name_for(None, relative) else {
            continue;
        };
        if names::matches_prefixes(&name, prefixes) && !remote_names.contains(&name) {
            out.push(entry.into_path());
        }
    }
    Ok(out)
}

/// Remove every path in the delete set. Call only once all transfers in the
/// batch have succeeded. Returns the paths actually removed.
pub fn apply_delete_set(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::with_capacity(paths.len());
    for path in paths {
        match std::fs::remove_file(path) {
            Ok(()) => {
                tracing::info!(path = %path.display(), "removed local file absent from bucket");
                removed.push(path.clone());
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e).with_context(|| format!("remove {}", path.display())),
        }
    }
    Ok(removed)
}
