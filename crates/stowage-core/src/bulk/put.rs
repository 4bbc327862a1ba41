use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Arc;

use crate::appliance::PutObject;
use crate::checksum;
use crate::health;
use crate::recovery::{BulkJobType, JobDescriptor};
use crate::sync::{self, RemoteState, SyncCandidate, SyncDecision, TransferDirection};

use super::candidates::{self, LocalFile};
use super::channels::PutChannels;
use super::options::{PutBulkOptions, PutSource};
use super::phase::{JobPhase, PhaseTracker};
use super::transfer::run_transfer;
use super::{BulkContext, BulkOutcome};

/// Upload a directory tree or a piped list of files as one bulk job.
pub async fn put_bulk(ctx: &BulkContext, opts: PutBulkOptions) -> Result<BulkOutcome> {
    let mut tracker = PhaseTracker::new();
    let mut outcome = BulkOutcome::default();

    // INITIATED: resolve the local file set.
    let prefix = opts.prefix.as_deref();
    let set = match &opts.source {
        PutSource::Directory(dir) => candidates::collect_directory(
            dir,
            prefix,
            opts.follow_symlinks,
            opts.ignore_naming_conflicts,
        )?,
        PutSource::Piped { base, names } => candidates::collect_piped(
            base,
            names,
            prefix,
            opts.follow_symlinks,
            opts.ignore_naming_conflicts,
        )?,
    };
    outcome.ignored = set.ignored;
    let mut files = set.files;
    tracing::info!(bucket = %opts.bucket, files = files.len(), ignored = outcome.ignored.len(), "put: resolved local files");

    let overridden = health::check_health(ctx.appliance.as_ref(), opts.force).await?;
    for report in &overridden {
        outcome.warnings.push(format!(
            "proceeding despite {} outstanding {} (--force)",
            report.entries.len(),
            report.category.title().to_lowercase()
        ));
    }
    tracker.advance(JobPhase::HealthChecked)?;

    ctx.appliance
        .ensure_bucket(&opts.bucket)
        .await
        .with_context(|| format!("prepare bucket {}", opts.bucket))?;

    if opts.sync {
        files = filter_for_sync(ctx, &opts, files, &mut outcome).await?;
    }
    tracker.advance(JobPhase::CandidatesFiltered)?;

    if files.is_empty() {
        tracker.advance(JobPhase::Completed)?;
        outcome.phase = Some(tracker.current());
        outcome.message = if outcome.skipped.is_empty() && !opts.sync {
            "Nothing to transfer".to_string()
        } else {
            "SUCCESS: All files are up to date".to_string()
        };
        return Ok(outcome);
    }

    let mut objects = Vec::with_capacity(files.len());
    for file in &files {
        let checksum = if opts.checksum {
            Some(checksum::sha256_path_blocking(file.path.clone()).await?)
        } else {
            None
        };
        objects.push(PutObject {
            name: file.name.clone(),
            size: file.size,
            checksum,
        });
    }

    let job_id = ctx.appliance.start_write_job(&opts.bucket, &objects).await?;
    outcome.job_id = Some(job_id);

    let directory = match &opts.source {
        PutSource::Directory(dir) => Some(dir.clone()),
        PutSource::Piped { .. } => None,
    };
    let descriptor = JobDescriptor::new(
        BulkJobType::PutBulk,
        job_id,
        opts.bucket.clone(),
        directory,
        opts.prefix.iter().cloned().collect(),
        opts.threads,
    );
    ctx.store.write(&descriptor)?;
    tracker.advance(JobPhase::DescriptorPersisted)?;

    let channels = Arc::new(PutChannels::for_files(&files, opts.metadata.clone()));
    let summary = run_transfer(ctx, &mut tracker, job_id, channels, opts.threads).await?;

    outcome.phase = Some(tracker.current());
    outcome.bytes = summary.bytes;
    outcome.transferred = files.into_iter().map(|f| f.name).collect();
    outcome.message = format!(
        "SUCCESS: Wrote {} object(s) ({} bytes) to bucket {}",
        outcome.transferred.len(),
        outcome.bytes,
        opts.bucket
    );
    Ok(outcome)
}

async fn filter_for_sync(
    ctx: &BulkContext,
    opts: &PutBulkOptions,
    files: Vec<LocalFile>,
    outcome: &mut BulkOutcome,
) -> Result<Vec<LocalFile>> {
    let remote: HashMap<String, RemoteState> = ctx
        .appliance
        .list_objects(&opts.bucket, opts.prefix.as_deref())
        .await?
        .into_iter()
        .map(|o| {
            let state = RemoteState::from_metadata(&o.metadata, o.size);
            (o.name, state)
        })
        .collect();

    let mut keep = Vec::with_capacity(files.len());
    for file in files {
        let candidate = SyncCandidate {
            name: file.name.clone(),
            local_path: file.path.clone(),
            remote: remote.get(&file.name).cloned(),
        };
        if candidate
            .remote
            .as_ref()
            .is_some_and(|r| r.last_modified_ms.is_none())
        {
            outcome.warnings.push(format!(
                "{}: remote object lacks last-modified metadata; sending again",
                file.name
            ));
        }
        match sync::decide(&candidate, TransferDirection::Put) {
            SyncDecision::Transfer => keep.push(file),
            SyncDecision::Skip => outcome.skipped.push(file.name),
        }
    }
    tracing::info!(transfer = keep.len(), skipped = outcome.skipped.len(), "put: sync filter");
    Ok(keep)
}
