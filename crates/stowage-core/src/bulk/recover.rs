//! Re-entering a job from its recovery descriptor, and job cancellation.

use anyhow::{Context, Result};
use std::sync::Arc;
use thiserror::Error;

use crate::appliance::{ApplianceError, JobStatus, ObjectChannels};
use crate::metadata::Metadata;
use crate::recovery::{BulkJobType, JobDescriptor, JobId, RecoveryError};

use super::channels::{GetChannels, PutChannels};
use super::options::RecoverOverrides;
use super::phase::PhaseTracker;
use super::transfer::{confirm_completed, run_transfer};
use super::{BulkContext, BulkOutcome, NonResumableJob};

#[derive(Debug, Error)]
pub enum RecoverSelectionError {
    #[error("No matching recovery files found.")]
    NoMatch,
    #[error(
        "Multiple matching recovery files found:\n{}\nPlease restrict search criteria.",
        list(.0)
    )]
    Ambiguous(Vec<JobDescriptor>),
}

fn list(descriptors: &[JobDescriptor]) -> String {
    descriptors
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// `--recover` acts on exactly one descriptor.
pub fn select_single(
    mut matches: Vec<JobDescriptor>,
) -> Result<JobDescriptor, RecoverSelectionError> {
    match matches.len() {
        0 => Err(RecoverSelectionError::NoMatch),
        1 => Ok(matches.remove(0)),
        _ => Err(RecoverSelectionError::Ambiguous(matches)),
    }
}

/// Load the descriptor for `id`, ask the appliance where the job stands, and
/// resume the transfer if it is still in progress.
pub async fn recover_job(
    ctx: &BulkContext,
    id: JobId,
    overrides: RecoverOverrides,
) -> Result<BulkOutcome> {
    let descriptor = ctx.store.read(id)?;
    let mut tracker = PhaseTracker::resumed();
    let mut outcome = BulkOutcome {
        job_id: Some(id),
        ..BulkOutcome::default()
    };
    tracing::info!(job_id = %id, job_type = %descriptor.job_type, bucket = %descriptor.bucket_name, "recovering job");

    match ctx.appliance.job_status(id).await? {
        None => {
            return Err(NonResumableJob {
                job_id: id,
                reason: "the appliance no longer knows this job".into(),
            }
            .into())
        }
        Some(JobStatus::Canceled) => {
            return Err(NonResumableJob {
                job_id: id,
                reason: "the job was canceled on the appliance".into(),
            }
            .into())
        }
        Some(JobStatus::Completed) => {
            confirm_completed(ctx, &mut tracker, id).await?;
            outcome.phase = Some(tracker.current());
            outcome.message = format!("Job {id} had already completed; recovery descriptor removed");
            return Ok(outcome);
        }
        Some(JobStatus::InProgress) => {}
    }

    let directory = overrides
        .directory
        .clone()
        .or_else(|| descriptor.directory.clone())
        .with_context(|| {
            format!(
                "recovery descriptor for job {id} records no local directory; pass --directory"
            )
        })?;
    let (channels, get_channels): (Arc<dyn ObjectChannels>, Option<Arc<GetChannels>>) =
        match descriptor.job_type {
            BulkJobType::PutBulk => {
                let put: Arc<dyn ObjectChannels> = Arc::new(PutChannels::for_directory(
                    directory.clone(),
                    descriptor.prefixes.first().cloned(),
                    Metadata::new(),
                ));
                (put, None)
            }
            BulkJobType::GetBulk => {
                let get = Arc::new(GetChannels::new(directory.clone()));
                let channels: Arc<dyn ObjectChannels> = get.clone();
                (channels, Some(get))
            }
        };
    let threads = overrides.threads.unwrap_or(descriptor.number_of_threads);

    let summary = run_transfer(ctx, &mut tracker, id, channels, threads).await?;
    if let Some(get) = get_channels {
        outcome.warnings.extend(get.take_warnings());
    }

    outcome.phase = Some(tracker.current());
    outcome.bytes = summary.bytes;
    outcome.message = format!(
        "SUCCESS: Recovered {} job {} ({} object(s), {} bytes) for bucket {} in {}",
        descriptor.job_type,
        id,
        summary.objects,
        summary.bytes,
        descriptor.bucket_name,
        directory.display()
    );
    Ok(outcome)
}

/// Cancel a job on the appliance. The local descriptor, if any, stays.
/// Returns whether a descriptor exists for the job.
pub async fn cancel_job(ctx: &BulkContext, id: JobId) -> Result<bool> {
    if ctx.appliance.job_status(id).await?.is_none() {
        return Err(ApplianceError::UnknownJob(id).into());
    }
    ctx.appliance.cancel_job(id).await?;
    let has_descriptor = match ctx.store.read(id) {
        Ok(_) => true,
        Err(RecoveryError::NotFound(_)) => false,
        Err(e) => return Err(e.into()),
    };
    Ok(has_descriptor)
}
