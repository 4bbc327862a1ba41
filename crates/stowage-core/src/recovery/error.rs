use std::path::PathBuf;
use thiserror::Error;

use super::types::JobId;

#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("no recovery descriptor found for job {0}")]
    NotFound(JobId),
    #[error("recovery descriptor {} is corrupt: {source}; inspect or remove it", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("recovery descriptor I/O on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
