//! Bulk transfer orchestration.
//!
//! A bulk job walks `INITIATED -> HEALTH_CHECKED -> CANDIDATES_FILTERED ->
//! DESCRIPTOR_PERSISTED -> TRANSFERRING -> COMPLETED` (or `INTERRUPTED`).
//! The recovery descriptor is on disk before the first byte moves and is
//! removed only after the appliance reports the job completed.

mod candidates;
mod channels;
mod get;
mod object;
mod options;
mod phase;
mod put;
mod recover;
mod transfer;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::appliance::Appliance;
use crate::control::AbortToken;
use crate::recovery::{JobId, RecoveryStore};

pub use candidates::{collect_directory, collect_piped, CandidateSet, IgnoredFile, LocalFile};
pub use channels::{GetChannels, PutChannels};
pub use get::get_bulk;
pub use object::get_object;
pub use options::{GetBulkOptions, GetObjectOptions, PutBulkOptions, PutSource, RecoverOverrides};
pub use phase::{JobPhase, PhaseTracker};
pub use put::put_bulk;
pub use recover::{cancel_job, recover_job, select_single, RecoverSelectionError};

/// Everything a bulk command needs besides its options.
#[derive(Clone)]
pub struct BulkContext {
    pub appliance: Arc<dyn Appliance>,
    pub store: RecoveryStore,
    pub abort: AbortToken,
}

impl BulkContext {
    pub fn new(appliance: Arc<dyn Appliance>, store: RecoveryStore) -> Self {
        Self {
            appliance,
            store,
            abort: AbortToken::new(),
        }
    }
}

/// Summary of a finished command.
#[derive(Debug, Clone, Default)]
pub struct BulkOutcome {
    /// `None` when nothing needed to move and no job was created.
    pub job_id: Option<JobId>,
    pub phase: Option<JobPhase>,
    pub transferred: Vec<String>,
    pub skipped: Vec<String>,
    pub ignored: Vec<IgnoredFile>,
    pub deleted: Vec<PathBuf>,
    pub bytes: u64,
    pub warnings: Vec<String>,
    pub message: String,
}

impl fmt::Display for BulkOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if !self.skipped.is_empty() {
            write!(f, "\nSkipped {} up-to-date object(s)", self.skipped.len())?;
        }
        if !self.deleted.is_empty() {
            write!(f, "\nRemoved {} local file(s) no longer in the bucket", self.deleted.len())?;
        }
        if !self.ignored.is_empty() {
            write!(f, "\nIgnored files:")?;
            for ignored in &self.ignored {
                write!(f, "\n  {ignored}")?;
            }
        }
        for warning in &self.warnings {
            write!(f, "\nWARNING: {warning}")?;
        }
        Ok(())
    }
}

/// The appliance no longer knows (or has canceled) a job a descriptor points at.
#[derive(Debug, Error)]
#[error(
    "job {job_id} cannot be resumed: {reason}. The local recovery descriptor was left in place; \
     remove it with `stowage recover --delete --id {job_id}`"
)]
pub struct NonResumableJob {
    pub job_id: JobId,
    pub reason: String,
}

/// The transfer stopped before completion; the descriptor is kept.
#[derive(Debug, Error)]
#[error("job {job_id} was interrupted: {reason}")]
pub struct JobInterrupted {
    pub job_id: JobId,
    pub reason: String,
}
