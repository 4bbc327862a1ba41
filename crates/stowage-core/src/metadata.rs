//! Object metadata codec.
//!
//! Objects carry a flat key/value map. One reserved key holds the source
//! file's modification time as decimal milliseconds since the Unix epoch; it
//! is what sync compares against, never the storage layer's own timestamps.
//! Every other key is operator-supplied and passed through untouched.

use filetime::FileTime;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Metadata map carried on stored objects.
pub type Metadata = BTreeMap<String, String>;

/// Reserved key carrying the last-modified time in milliseconds.
pub const LAST_MODIFIED_KEY: &str = "stowage-last-modified-ms";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MetadataError {
    #[error("malformed metadata entry: {0} (expected key:value)")]
    Malformed(String),
}

/// Build the reserved metadata entry for a local timestamp.
pub fn encode_last_modified(millis: i64) -> (String, String) {
    (LAST_MODIFIED_KEY.to_string(), millis.to_string())
}

/// Decode the reserved entry. Absent or unparsable values yield `None`.
pub fn decode_last_modified(metadata: &Metadata) -> Option<i64> {
    let raw = metadata.get(LAST_MODIFIED_KEY)?;
    match raw.trim().parse::<i64>() {
        Ok(ms) => Some(ms),
        Err(_) => {
            tracing::warn!(value = %raw, "ignoring unparsable {}", LAST_MODIFIED_KEY);
            None
        }
    }
}

/// Parse `key:value` entries from the command line.
pub fn parse_user_metadata<S: AsRef<str>>(entries: &[S]) -> Result<Metadata, MetadataError> {
    let mut out = Metadata::new();
    for entry in entries {
        let entry = entry.as_ref();
        let mut parts = entry.split(':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(k), Some(v), None) if !k.is_empty() => {
                out.insert(k.to_string(), v.to_string());
            }
            _ => return Err(MetadataError::Malformed(entry.to_string())),
        }
    }
    Ok(out)
}

/// Merge operator metadata with the reserved timestamp entry. The reserved key
/// always wins a collision.
pub fn merge_for_put(user: &Metadata, local_millis: Option<i64>) -> Metadata {
    let mut out = user.clone();
    if let Some(ms) = local_millis {
        let (k, v) = encode_last_modified(ms);
        if let Some(previous) = out.insert(k, v) {
            tracing::warn!(value = %previous, "operator metadata used reserved key {}; overridden", LAST_MODIFIED_KEY);
        }
    }
    out
}

/// Modification time of a local file in milliseconds since the epoch.
pub fn local_last_modified(path: &Path) -> std::io::Result<i64> {
    let meta = std::fs::metadata(path)?;
    Ok(file_time_to_millis(FileTime::from_last_modification_time(&meta)))
}

pub fn file_time_to_millis(t: FileTime) -> i64 {
    t.unix_seconds() * 1000 + i64::from(t.nanoseconds() / 1_000_000)
}

pub fn millis_to_file_time(ms: i64) -> FileTime {
    let secs = ms.div_euclid(1000);
    let nanos = (ms.rem_euclid(1000) * 1_000_000) as u32;
    FileTime::from_unix_time(secs, nanos)
}

/// Outcome of restoring a local timestamp after GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    Restored(i64),
    /// Object carried no reserved key; nothing to restore.
    NoTimestamp,
    /// Setting the mtime failed. Best effort: the transfer still succeeds.
    Failed(String),
}

/// Set `path`'s modification time from the reserved entry, if present.
pub fn restore_local_timestamp(path: &Path, metadata: &Metadata) -> RestoreOutcome {
    let Some(ms) = decode_last_modified(metadata) else {
        tracing::warn!(path = %path.display(), "object does not carry a last-modified entry");
        return RestoreOutcome::NoTimestamp;
    };
    match filetime::set_file_mtime(path, millis_to_file_time(ms)) {
        Ok(()) => RestoreOutcome::Restored(ms),
        Err(e) => {
            tracing::warn!(path = %path.display(), "could not restore modification time: {}", e);
            RestoreOutcome::Failed(format!("{}: {}", path.display(), e))
        }
    }
}
