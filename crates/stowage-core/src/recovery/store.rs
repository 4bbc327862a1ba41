//! File-per-job descriptor store.
//!
//! `<dir>/<job-id>.json`, pretty JSON, written through a `.part` file and an
//! atomic rename. Writers of different job ids never touch the same file;
//! concurrent writers of the same id are not coordinated.

use anyhow::Result;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::storage;

use super::error::RecoveryError;
use super::types::{JobDescriptor, JobFilter, JobId};

pub const DESCRIPTOR_EXTENSION: &str = "json";

/// `~/.local/state/stowage/recovery`.
pub fn default_recovery_dir() -> Result<PathBuf> {
    let dir = xdg::BaseDirectories::with_prefix("stowage")?.get_state_home();
    Ok(dir.join("recovery"))
}

#[derive(Debug, Clone)]
pub struct RecoveryStore {
    dir: PathBuf,
}

impl RecoveryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the descriptor for `id`; derived from the id alone.
    pub fn path_for(&self, id: JobId) -> PathBuf {
        self.dir.join(format!("{id}.{DESCRIPTOR_EXTENSION}"))
    }

    pub fn write(&self, descriptor: &JobDescriptor) -> Result<PathBuf, RecoveryError> {
        let path = self.path_for(descriptor.id);
        let body = serde_json::to_string_pretty(descriptor).map_err(|source| {
            RecoveryError::Corrupt {
                path: path.clone(),
                source,
            }
        })?;
        storage::write_atomic(&path, body.as_bytes()).map_err(|source| RecoveryError::Io {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(job_id = %descriptor.id, path = %path.display(), "wrote recovery descriptor");
        Ok(path)
    }

    pub fn read(&self, id: JobId) -> Result<JobDescriptor, RecoveryError> {
        let path = self.path_for(id);
        match fs::read(&path) {
            Ok(bytes) => parse_descriptor(&path, &bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(RecoveryError::NotFound(id)),
            Err(source) => Err(RecoveryError::Io { path, source }),
        }
    }

    /// Lazily enumerate descriptors on disk. Every call re-reads the directory;
    /// a missing directory yields an empty sequence.
    pub fn list(&self) -> Result<DescriptorIter, RecoveryError> {
        match fs::read_dir(&self.dir) {
            Ok(entries) => Ok(DescriptorIter {
                entries: Some(entries),
                dir: self.dir.clone(),
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(DescriptorIter {
                entries: None,
                dir: self.dir.clone(),
            }),
            Err(source) => Err(RecoveryError::Io {
                path: self.dir.clone(),
                source,
            }),
        }
    }

    /// All descriptors matching `filter`. A corrupt descriptor fails the search.
    ///
    /// With an id in the filter only that job's file is read, so unrelated
    /// descriptors (corrupt or not) are never parsed.
    pub fn search(&self, filter: &JobFilter) -> Result<Vec<JobDescriptor>, RecoveryError> {
        if let Some(id) = filter.id {
            return match self.read(id) {
                Ok(d) if filter.matches(&d) => Ok(vec![d]),
                Ok(_) | Err(RecoveryError::NotFound(_)) => Ok(Vec::new()),
                Err(e) => Err(e),
            };
        }
        let mut out = Vec::new();
        for descriptor in self.list()? {
            let descriptor = descriptor?;
            if filter.matches(&descriptor) {
                out.push(descriptor);
            }
        }
        out.sort_by(|a, b| a.creation_date.cmp(&b.creation_date));
        Ok(out)
    }

    /// Remove the descriptor for `id`. Returns whether a file was removed.
    pub fn delete(&self, id: JobId) -> Result<bool, RecoveryError> {
        let path = self.path_for(id);
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(job_id = %id, "removed recovery descriptor");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(RecoveryError::Io { path, source }),
        }
    }

    /// Delete every descriptor matching `filter`.
    ///
    /// A filter naming only an id removes that file even when it no longer
    /// parses; other filters need the descriptor contents and surface
    /// corruption instead.
    pub fn delete_matching(
        &self,
        filter: &JobFilter,
    ) -> Result<Vec<DeletedDescriptor>, RecoveryError> {
        if let Some(id) = filter.id {
            let id_only = filter.bucket.is_none() && filter.job_type.is_none();
            let descriptor = match self.read(id) {
                Ok(d) if filter.matches(&d) => Some(d),
                Ok(_) | Err(RecoveryError::NotFound(_)) => return Ok(Vec::new()),
                Err(RecoveryError::Corrupt { path, .. }) if id_only => {
                    tracing::warn!(job_id = %id, path = %path.display(), "removing unparsable recovery descriptor");
                    None
                }
                Err(e) => return Err(e),
            };
            return Ok(if self.delete(id)? {
                vec![DeletedDescriptor { id, descriptor }]
            } else {
                Vec::new()
            });
        }

        let mut out = Vec::new();
        for d in self.search(filter)? {
            if self.delete(d.id)? {
                out.push(DeletedDescriptor {
                    id: d.id,
                    descriptor: Some(d),
                });
            }
        }
        Ok(out)
    }
}

/// A descriptor removed by [`RecoveryStore::delete_matching`]. `descriptor` is
/// `None` when the file could not be parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct DeletedDescriptor {
    pub id: JobId,
    pub descriptor: Option<JobDescriptor>,
}

impl std::fmt::Display for DeletedDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.descriptor {
            Some(d) => write!(f, "{d}"),
            None => write!(f, "unparsable descriptor, ID: {}", self.id),
        }
    }
}

fn parse_descriptor(path: &Path, bytes: &[u8]) -> Result<JobDescriptor, RecoveryError> {
    serde_json::from_slice(bytes).map_err(|source| RecoveryError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

/// Iterator returned by [`RecoveryStore::list`].
pub struct DescriptorIter {
    entries: Option<fs::ReadDir>,
    dir: PathBuf,
}

impl Iterator for DescriptorIter {
    type Item = Result<JobDescriptor, RecoveryError>;

    fn next(&mut self) -> Option<Self::Item> {
        let entries = self.entries.as_mut()?;
        loop {
            let entry = match entries.next()? {
                Ok(entry) => entry,
                Err(source) => {
                    return Some(Err(RecoveryError::Io {
                        path: self.dir.clone(),
                        source,
                    }))
                }
            };
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(DESCRIPTOR_EXTENSION) {
                continue;
            }
            if !path.is_file() {
                continue;
            }
            return Some(match fs::read(&path) {
                Ok(bytes) => parse_descriptor(&path, &bytes),
                // Removed between readdir and open.
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(source) => Err(RecoveryError::Io { path, source }),
            });
        }
    }
}
