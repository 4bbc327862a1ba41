//! File lifecycle helpers: everything lands at a `.part` path first and is
//! renamed into place, so readers never observe a half-written file.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Path for the temp file: appends `.part` to the final path (e.g. `a.json` → `a.json.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// Write `bytes` to `final_path` via its temp path and a rename.
pub fn write_atomic(final_path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = final_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = temp_path(final_path);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, final_path)
}

/// A copy sitting at its temp path, waiting to be checked and finalized.
#[derive(Debug)]
pub struct StagedCopy {
    temp_path: PathBuf,
    final_path: PathBuf,
    bytes: u64,
}

impl StagedCopy {
    /// Copy `src` to the temp path of `final_path`, creating parent directories.
    pub fn create(src: &Path, final_path: &Path) -> io::Result<Self> {
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let temp_path = temp_path(final_path);
        let bytes = fs::copy(src, &temp_path)?;
        File::open(&temp_path)?.sync_all()?;
        Ok(Self {
            temp_path,
            final_path: final_path.to_path_buf(),
            bytes,
        })
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Rename into place. Fails if the final path is on another filesystem.
    pub fn finalize(self) -> io::Result<u64> {
        fs::rename(&self.temp_path, &self.final_path)?;
        Ok(self.bytes)
    }

    /// Drop the temp file without touching the final path.
    pub fn discard(self) {
        if let Err(e) = fs::remove_file(&self.temp_path) {
            tracing::debug!(path = %self.temp_path.display(), "could not remove temp file: {}", e);
        }
    }
}
