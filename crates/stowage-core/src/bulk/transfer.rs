//! TRANSFERRING and what follows it: confirmation, descriptor cleanup, or
//! classification of the interruption.

use anyhow::Result;
use std::sync::Arc;

use crate::appliance::{
    find_appliance_error, ApplianceError, JobStatus, ObjectChannels, TransferOptions,
    TransferSummary,
};
use crate::control;
use crate::recovery::JobId;

use super::phase::{JobPhase, PhaseTracker};
use super::{BulkContext, JobInterrupted, NonResumableJob};

pub(super) async fn run_transfer(
    ctx: &BulkContext,
    tracker: &mut PhaseTracker,
    id: JobId,
    channels: Arc<dyn ObjectChannels>,
    threads: usize,
) -> Result<TransferSummary> {
    tracker.advance(JobPhase::Transferring)?;
    let options = TransferOptions {
        threads: threads.max(1),
        abort: ctx.abort.clone(),
    };
    match ctx.appliance.transfer(id, channels, options).await {
        Ok(summary) => {
            confirm_completed(ctx, tracker, id).await?;
            Ok(summary)
        }
        Err(err) => Err(classify_interruption(ctx, tracker, id, err).await),
    }
}

/// Delete the descriptor only once the appliance itself reports completion.
pub(super) async fn confirm_completed(
    ctx: &BulkContext,
    tracker: &mut PhaseTracker,
    id: JobId,
) -> Result<()> {
    match ctx.appliance.job_status(id).await? {
        Some(JobStatus::Completed) => {
            ctx.store.delete(id)?;
            tracker.advance(JobPhase::Completed)?;
            tracing::info!(job_id = %id, "job completed; recovery descriptor removed");
            Ok(())
        }
        other => {
            tracker.advance(JobPhase::Interrupted)?;
            Err(JobInterrupted {
                job_id: id,
                reason: format!("appliance reports status {other:?} after transfer"),
            }
            .into())
        }
    }
}

async fn classify_interruption(
    ctx: &BulkContext,
    tracker: &mut PhaseTracker,
    id: JobId,
    err: anyhow::Error,
) -> anyhow::Error {
    if let Err(e) = tracker.advance(JobPhase::Interrupted) {
        tracing::debug!("{:#}", e);
    }
    interruption_error(ctx, id, err).await
}

/// Turn a failed transfer into the error the operator sees. An abort cancels
/// the job on the appliance first.
pub(super) async fn interruption_error(
    ctx: &BulkContext,
    id: JobId,
    err: anyhow::Error,
) -> anyhow::Error {
    if control::is_aborted(&err) {
        tracing::warn!(job_id = %id, "transfer aborted; canceling job on the appliance");
        if let Err(e) = ctx.appliance.cancel_job(id).await {
            tracing::warn!(job_id = %id, "cancel after abort failed: {:#}", e);
        }
        return JobInterrupted {
            job_id: id,
            reason: "canceled by operator".into(),
        }
        .into();
    }

    match find_appliance_error(&err) {
        Some(ApplianceError::UnknownJob(_)) => NonResumableJob {
            job_id: id,
            reason: "the appliance no longer knows this job".into(),
        }
        .into(),
        Some(ApplianceError::JobCanceled(_)) => NonResumableJob {
            job_id: id,
            reason: "the job was canceled on the appliance".into(),
        }
        .into(),
        _ => {
            tracing::error!(job_id = %id, "transfer failed: {:#}", err);
            err.context(JobInterrupted {
                job_id: id,
                reason: "transfer failed".into(),
            })
        }
    }
}
