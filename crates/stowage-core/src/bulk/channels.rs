//! Metadata-aware channel factories handed to the appliance transfer.

use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::appliance::ObjectChannels;
use crate::metadata::{self, Metadata, RestoreOutcome};
use crate::names;

use super::candidates::LocalFile;

enum PutPaths {
    /// Exact name -> path map built from the candidate set.
    Mapped(HashMap<String, PathBuf>),
    /// Names resolved under a directory (recovery), with the job prefix stripped.
    Directory { root: PathBuf, prefix: Option<String> },
}

/// PUT side: resolves local sources and attaches the last-modified entry
/// (merged over operator metadata) to every object.
pub struct PutChannels {
    paths: PutPaths,
    user_metadata: Metadata,
}

impl PutChannels {
    pub fn for_files(files: &[LocalFile], user_metadata: Metadata) -> Self {
        let map = files
            .iter()
            .map(|f| (f.name.clone(), f.path.clone()))
            .collect();
        Self {
            paths: PutPaths::Mapped(map),
            user_metadata,
        }
    }

    pub fn for_directory(root: PathBuf, prefix: Option<String>, user_metadata: Metadata) -> Self {
        Self {
            paths: PutPaths::Directory { root, prefix },
            user_metadata,
        }
    }
}

impl ObjectChannels for PutChannels {
    fn local_path(&self, name: &str) -> Result<PathBuf> {
        match &self.paths {
            PutPaths::Mapped(map) => map
                .get(name)
                .cloned()
                .ok_or_else(|| anyhow!("no local file registered for object {name}")),
            PutPaths::Directory { root, prefix } => {
                names::local_path_for(root, name, prefix.as_deref())
            }
        }
    }

    fn outgoing_metadata(&self, name: &str) -> Metadata {
        let local_ms = self.local_path(name).ok().and_then(|path| {
            metadata::local_last_modified(&path)
                .map_err(|e| {
                    tracing::warn!(object = %name, "cannot read modification time: {}", e);
                })
                .ok()
        });
        metadata::merge_for_put(&self.user_metadata, local_ms)
    }
}

/// GET side: writes under a directory and restores modification times as
/// each object lands. Restore failures are collected, never raised.
pub struct GetChannels {
    root: PathBuf,
    warnings: Mutex<Vec<String>>,
}

impl GetChannels {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            warnings: Mutex::new(Vec::new()),
        }
    }

    /// Timestamp-restore problems seen so far.
    pub fn take_warnings(&self) -> Vec<String> {
        std::mem::take(&mut *self.warnings.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

impl ObjectChannels for GetChannels {
    fn local_path(&self, name: &str) -> Result<PathBuf> {
        names::local_path_for(&self.root, name, None)
    }

    fn object_completed(&self, name: &str, metadata: &Metadata) {
        let Ok(path) = self.local_path(name) else {
            return;
        };
        let warning = match metadata::restore_local_timestamp(&path, metadata) {
            RestoreOutcome::Restored(_) => return,
            RestoreOutcome::NoTimestamp => {
                format!("{name}: object has no last-modified metadata; local time not restored")
            }
            RestoreOutcome::Failed(reason) => {
                format!("could not restore modification time of {reason}")
            }
        };
        self.warnings
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(warning);
    }
}
