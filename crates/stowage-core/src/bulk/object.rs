use anyhow::Result;
use std::sync::Arc;

use crate::appliance::{ApplianceError, TransferOptions};
use crate::names;
use crate::sync::{self, RemoteState, SyncCandidate, SyncDecision, TransferDirection};

use super::channels::GetChannels;
use super::options::GetObjectOptions;
use super::transfer::interruption_error;
use super::{BulkContext, BulkOutcome};

/// Fetch a single object. No health gate and no recovery descriptor.
pub async fn get_object(ctx: &BulkContext, opts: GetObjectOptions) -> Result<BulkOutcome> {
    let mut outcome = BulkOutcome::default();
    let info = ctx
        .appliance
        .head_object(&opts.bucket, &opts.name)
        .await?
        .ok_or_else(|| ApplianceError::NoSuchObject {
            bucket: opts.bucket.clone(),
            name: opts.name.clone(),
        })?;
    let local_path = names::local_path_for(&opts.directory, &opts.name, None)?;

    if opts.sync {
        let candidate = SyncCandidate {
            name: opts.name.clone(),
            local_path: local_path.clone(),
            remote: Some(RemoteState::from_metadata(&info.metadata, info.size)),
        };
        if sync::decide(&candidate, TransferDirection::Get) == SyncDecision::Skip {
            outcome.skipped.push(opts.name.clone());
            outcome.message = format!("No need to sync {}", opts.name);
            return Ok(outcome);
        }
    }

    let job_id = ctx
        .appliance
        .start_read_job(&opts.bucket, std::slice::from_ref(&opts.name))
        .await?;
    outcome.job_id = Some(job_id);
    let channels = Arc::new(GetChannels::new(opts.directory.clone()));
    let options = TransferOptions {
        threads: 1,
        abort: ctx.abort.clone(),
    };
    let summary = match ctx
        .appliance
        .transfer(job_id, channels.clone(), options)
        .await
    {
        Ok(summary) => summary,
        Err(err) => return Err(interruption_error(ctx, job_id, err).await),
    };
    outcome.warnings.extend(channels.take_warnings());
    outcome.bytes = summary.bytes;
    outcome.transferred.push(opts.name.clone());
    outcome.message = format!(
        "SUCCESS: Finished downloading object {} to {}",
        opts.name,
        local_path.display()
    );
    Ok(outcome)
}
