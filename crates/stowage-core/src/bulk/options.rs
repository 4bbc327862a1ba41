//! Typed options, filled in once by the CLI and passed by value.

use std::path::PathBuf;

use crate::metadata::Metadata;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutSource {
    /// Recursively enumerate a directory.
    Directory(PathBuf),
    /// File names read from stdin, resolved against `base`.
    Piped { base: PathBuf, names: Vec<String> },
}

#[derive(Debug, Clone)]
pub struct PutBulkOptions {
    pub bucket: String,
    pub source: PutSource,
    /// Prepended to every object name.
    pub prefix: Option<String>,
    pub sync: bool,
    pub force: bool,
    pub threads: usize,
    pub checksum: bool,
    pub metadata: Metadata,
    pub ignore_naming_conflicts: bool,
    pub follow_symlinks: bool,
}

#[derive(Debug, Clone)]
pub struct GetBulkOptions {
    pub bucket: String,
    pub directory: PathBuf,
    /// Empty means the whole bucket.
    pub prefixes: Vec<String>,
    /// Exact object names read from stdin; each must exist.
    pub piped_names: Option<Vec<String>>,
    pub sync: bool,
    pub force: bool,
    pub threads: usize,
    /// Remove local files whose object no longer exists (after all transfers succeed).
    pub mirror: bool,
}

#[derive(Debug, Clone)]
pub struct GetObjectOptions {
    pub bucket: String,
    pub name: String,
    pub directory: PathBuf,
    pub sync: bool,
}

/// Values that override what a descriptor recorded.
#[derive(Debug, Clone, Default)]
pub struct RecoverOverrides {
    pub directory: Option<PathBuf>,
    pub threads: Option<usize>,
}
