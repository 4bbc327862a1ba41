use std::path::{Path, PathBuf};

use crate::metadata::{self, Metadata};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    Put,
    Get,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDecision {
    Transfer,
    Skip,
}

/// What the appliance reports about the remote side of a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteState {
    /// Decoded reserved metadata entry; `None` when the object lacks it.
    pub last_modified_ms: Option<i64>,
    pub size: u64,
}

impl RemoteState {
    pub fn from_metadata(metadata: &Metadata, size: u64) -> Self {
        Self {
            last_modified_ms: metadata::decode_last_modified(metadata),
            size,
        }
    }
}

/// One local path paired with its remote object, if any.
#[derive(Debug, Clone)]
pub struct SyncCandidate {
    pub name: String,
    pub local_path: PathBuf,
    pub remote: Option<RemoteState>,
}

/// Decide whether `candidate` needs to move. Reads the local mtime lazily.
pub fn decide(candidate: &SyncCandidate, direction: TransferDirection) -> SyncDecision {
    let local = read_local_mtime(&candidate.local_path);
    let decision = decide_times(direction, local, candidate.remote.as_ref());
    if let Some(remote) = &candidate.remote {
        if remote.last_modified_ms.is_none() {
            tracing::warn!(
                object = %candidate.name,
                "remote object carries no last-modified metadata; transferring"
            );
        }
    }
    tracing::debug!(object = %candidate.name, ?direction, ?decision, "sync decision");
    decision
}

/// Pure comparison. `local_ms` is `None` when the local file is absent or unreadable.
///
/// Equal timestamps skip.
pub fn decide_times(
    direction: TransferDirection,
    local_ms: Option<i64>,
    remote: Option<&RemoteState>,
) -> SyncDecision {
    match direction {
        TransferDirection::Put => {
            let Some(remote) = remote else {
                return SyncDecision::Transfer;
            };
            match (local_ms, remote.last_modified_ms) {
                (Some(local), Some(remote)) if local <= remote => SyncDecision::Skip,
                _ => SyncDecision::Transfer,
            }
        }
        TransferDirection::Get => {
            let Some(local) = local_ms else {
                return SyncDecision::Transfer;
            };
            match remote.and_then(|r| r.last_modified_ms) {
                Some(remote) if remote <= local => SyncDecision::Skip,
                _ => SyncDecision::Transfer,
            }
        }
    }
}

fn read_local_mtime(path: &Path) -> Option<i64> {
    match metadata::local_last_modified(path) {
        Ok(ms) => Some(ms),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            tracing::warn!(path = %path.display(), "cannot read modification time: {}", e);
            None
        }
    }
}
