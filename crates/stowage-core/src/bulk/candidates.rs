//! Resolve the local file set of a PUT and the files it has to leave out.

use anyhow::{bail, Result};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::names;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
}

/// A discovered file excluded from the job, reported to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoredFile {
    pub path: String,
    pub reason: String,
}

impl IgnoredFile {
    fn new(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        let ignored = Self {
            path: path.as_ref().display().to_string(),
            reason: reason.into(),
        };
        tracing::warn!(path = %ignored.path, "ignoring file: {}", ignored.reason);
        ignored
    }
}

impl fmt::Display for IgnoredFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.reason)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    pub files: Vec<LocalFile>,
    pub ignored: Vec<IgnoredFile>,
}

/// Walk `root` recursively. Object names are the `/`-joined relative path
/// behind `prefix`.
pub fn collect_directory(
    root: &Path,
    prefix: Option<&str>,
    follow_symlinks: bool,
    ignore_naming_conflicts: bool,
) -> Result<CandidateSet> {
    if !root.is_dir() {
        bail!("{} is not a directory", root.display());
    }
    let mut set = CandidateSet::default();
    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(follow_symlinks)
        .sort_by_file_name();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
                set.ignored.push(IgnoredFile::new(path, e.to_string()));
                continue;
            }
        };
        let file_type = entry.file_type();
        if file_type.is_dir() {
            continue;
        }
        if file_type.is_symlink() {
            set.ignored.push(IgnoredFile::new(
                entry.path(),
                "symbolic link (use --follow-symlinks to include)",
            ));
            continue;
        }
        if !file_type.is_file() {
            set.ignored.push(IgnoredFile::new(entry.path(), "not a regular file"));
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let Some(name) = names::object_name_for(prefix, relative) else {
            set.ignored.push(IgnoredFile::new(entry.path(), "name is not valid UTF-8"));
            continue;
        };
        let size = match entry.metadata() {
            Ok(m) => m.len(),
            Err(e) => {
                set.ignored.push(IgnoredFile::new(entry.path(), e.to_string()));
                continue;
            }
        };
        set.files.push(LocalFile {
            name,
            path: entry.into_path(),
            size,
        });
    }
    resolve_conflicts(set, ignore_naming_conflicts)
}

/// Resolve names piped on stdin against `base`. Leading `/`, `./` and `../`
/// are stripped to form the object name.
pub fn collect_piped(
    base: &Path,
    raw_names: &[String],
    prefix: Option<&str>,
    follow_symlinks: bool,
    ignore_naming_conflicts: bool,
) -> Result<CandidateSet> {
    let mut set = CandidateSet::default();
    for raw in raw_names {
        let raw = raw.trim_end_matches(['\r', '\n']);
        if raw.trim().is_empty() {
            continue;
        }
        let path = base.join(raw);
        let link_meta = match fs::symlink_metadata(&path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                set.ignored.push(IgnoredFile::new(&path, "file not found"));
                continue;
            }
            Err(e) => {
                set.ignored.push(IgnoredFile::new(&path, e.to_string()));
                continue;
            }
        };
        if link_meta.file_type().is_symlink() && !follow_symlinks {
            set.ignored.push(IgnoredFile::new(
                &path,
                "symbolic link (use --follow-symlinks to include)",
            ));
            continue;
        }
        let meta = match fs::metadata(&path) {
            Ok(m) => m,
            Err(e) => {
                set.ignored.push(IgnoredFile::new(&path, e.to_string()));
                continue;
            }
        };
        if meta.is_dir() {
            set.ignored.push(IgnoredFile::new(&path, "is a directory"));
            continue;
        }
        if !meta.is_file() {
            set.ignored.push(IgnoredFile::new(&path, "not a regular file"));
            continue;
        }
        let normalized = names::normalize_object_name(raw);
        let Some(name) = names::object_name_for(prefix, Path::new(&normalized)) else {
            set.ignored.push(IgnoredFile::new(&path, "invalid object name"));
            continue;
        };
        set.files.push(LocalFile {
            name,
            path,
            size: meta.len(),
        });
    }
    resolve_conflicts(set, ignore_naming_conflicts)
}

/// Two different files mapping to one object name are both excluded, unless
/// conflicts are ignored, in which case the first one wins. The same path
/// listed twice is collapsed silently.
fn resolve_conflicts(set: CandidateSet, ignore_naming_conflicts: bool) -> Result<CandidateSet> {
    let CandidateSet { files, mut ignored } = set;
    let mut groups: Vec<Vec<LocalFile>> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for file in files {
        match index.get(&file.name) {
            Some(&i) => {
                if !groups[i].iter().any(|f| f.path == file.path) {
                    groups[i].push(file);
                }
            }
            None => {
                index.insert(file.name.clone(), groups.len());
                groups.push(vec![file]);
            }
        }
    }

    let mut kept = Vec::with_capacity(groups.len());
    for mut group in groups {
        if group.len() == 1 {
            kept.extend(group);
            continue;
        }
        if ignore_naming_conflicts {
            let first = group.remove(0);
            for other in group {
                ignored.push(IgnoredFile::new(
                    &other.path,
                    format!("naming conflict with {}", first.path.display()),
                ));
            }
            kept.push(first);
        } else {
            let count = group.len();
            for file in group {
                ignored.push(IgnoredFile::new(
                    &file.path,
                    format!(
                        "naming conflict: {count} files map to object {} (use --ignore-naming-conflicts to keep the first)",
                        file.name
                    ),
                ));
            }
        }
    }
    Ok(CandidateSet {
        files: kept,
        ignored,
    })
}
