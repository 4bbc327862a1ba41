use anyhow::{bail, Result};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::appliance::{ApplianceError, ObjectInfo};
use crate::health;
use crate::names;
use crate::recovery::{BulkJobType, JobDescriptor};
use crate::sync::{self, RemoteState, SyncCandidate, SyncDecision, TransferDirection};

use super::channels::GetChannels;
use super::options::GetBulkOptions;
use super::phase::{JobPhase, PhaseTracker};
use super::transfer::run_transfer;
use super::{BulkContext, BulkOutcome};

/// Download a bucket (or a prefix-scoped part of it, or piped names) into a directory.
pub async fn get_bulk(ctx: &BulkContext, opts: GetBulkOptions) -> Result<BulkOutcome> {
    let mut tracker = PhaseTracker::new();
    let mut outcome = BulkOutcome::default();

    // INITIATED: resolve the remote object set.
    let objects = resolve_objects(ctx, &opts).await?;
    if objects.is_empty() {
        bail!("No matching objects in bucket {}", opts.bucket);
    }
    let remote_names = if opts.mirror {
        mirror_listing(ctx, &opts, &objects).await?
    } else {
        HashSet::new()
    };
    tracing::info!(bucket = %opts.bucket, objects = objects.len(), "get: resolved remote objects");

    let overridden = health::check_health(ctx.appliance.as_ref(), opts.force).await?;
    for report in &overridden {
        outcome.warnings.push(format!(
            "proceeding despite {} outstanding {} (--force)",
            report.entries.len(),
            report.category.title().to_lowercase()
        ));
    }
    tracker.advance(JobPhase::HealthChecked)?;

    let mut to_fetch = Vec::with_capacity(objects.len());
    for object in objects {
        if !opts.sync {
            to_fetch.push(object.name);
            continue;
        }
        let candidate = SyncCandidate {
            local_path: names::local_path_for(&opts.directory, &object.name, None)?,
            remote: Some(RemoteState::from_metadata(&object.metadata, object.size)),
            name: object.name,
        };
        if candidate
            .remote
            .as_ref()
            .is_some_and(|r| r.last_modified_ms.is_none())
        {
            outcome.warnings.push(format!(
                "{}: object lacks last-modified metadata; fetching again",
                candidate.name
            ));
        }
        match sync::decide(&candidate, TransferDirection::Get) {
            SyncDecision::Transfer => to_fetch.push(candidate.name),
            SyncDecision::Skip => outcome.skipped.push(candidate.name),
        }
    }
    let delete_set = if opts.mirror {
        sync::mirror_delete_set(&opts.directory, &remote_names, &opts.prefixes)?
    } else {
        Vec::new()
    };
    tracker.advance(JobPhase::CandidatesFiltered)?;

    if to_fetch.is_empty() {
        tracker.advance(JobPhase::Completed)?;
        outcome.deleted = sync::apply_delete_set(&delete_set)?;
        outcome.phase = Some(tracker.current());
        outcome.message = "Nothing to do; all files are up to date".to_string();
        return Ok(outcome);
    }

    let job_id = ctx.appliance.start_read_job(&opts.bucket, &to_fetch).await?;
    outcome.job_id = Some(job_id);
    let descriptor = JobDescriptor::new(
        BulkJobType::GetBulk,
        job_id,
        opts.bucket.clone(),
        Some(opts.directory.clone()),
        opts.prefixes.clone(),
        opts.threads,
    );
    ctx.store.write(&descriptor)?;
    tracker.advance(JobPhase::DescriptorPersisted)?;

    let channels = Arc::new(GetChannels::new(opts.directory.clone()));
    let summary = run_transfer(ctx, &mut tracker, job_id, channels.clone(), opts.threads).await?;
    outcome.warnings.extend(channels.take_warnings());

    // Only after every transfer in the batch succeeded.
    outcome.deleted = sync::apply_delete_set(&delete_set)?;

    outcome.phase = Some(tracker.current());
    outcome.bytes = summary.bytes;
    outcome.transferred = to_fetch;
    outcome.message = format!(
        "SUCCESS: Read {} object(s) ({} bytes) from bucket {} into {}",
        outcome.transferred.len(),
        outcome.bytes,
        opts.bucket,
        opts.directory.display()
    );
    Ok(outcome)
}

/// Names that count as "still in the bucket" for mirror deletion. Piped names
/// are only a selection, so the bucket is listed in full for them.
async fn mirror_listing(
    ctx: &BulkContext,
    opts: &GetBulkOptions,
    objects: &[ObjectInfo],
) -> Result<HashSet<String>> {
    if opts.piped_names.is_none() {
        return Ok(objects.iter().map(|o| o.name.clone()).collect());
    }
    Ok(ctx
        .appliance
        .list_objects(&opts.bucket, None)
        .await?
        .into_iter()
        .map(|o| o.name)
        .collect())
}

async fn resolve_objects(ctx: &BulkContext, opts: &GetBulkOptions) -> Result<Vec<ObjectInfo>> {
    if let Some(piped) = &opts.piped_names {
        let mut out = Vec::with_capacity(piped.len());
        let mut seen = HashSet::new();
        for raw in piped {
            let name = raw.trim_end_matches(['\r', '\n']);
            if name.trim().is_empty() || !seen.insert(name.to_string()) {
                continue;
            }
            match ctx.appliance.head_object(&opts.bucket, name).await? {
                Some(info) => out.push(info),
                None => {
                    return Err(ApplianceError::NoSuchObject {
                        bucket: opts.bucket.clone(),
                        name: name.to_string(),
                    }
                    .into())
                }
            }
        }
        return Ok(out);
    }

    let mut by_name: BTreeMap<String, ObjectInfo> = BTreeMap::new();
    if opts.prefixes.is_empty() {
        for o in ctx.appliance.list_objects(&opts.bucket, None).await? {
            by_name.insert(o.name.clone(), o);
        }
    } else {
        for prefix in &opts.prefixes {
            for o in ctx.appliance.list_objects(&opts.bucket, Some(prefix)).await? {
                by_name.insert(o.name.clone(), o);
            }
        }
    }
    Ok(by_name
        .into_values()
        .filter(|o| {
            let marker = names::is_folder_marker(&o.name);
            if marker {
                tracing::debug!(object = %o.name, "skipping folder marker");
            }
            !marker
        })
        .collect())
}
