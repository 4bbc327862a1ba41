//! `stowage recover` – list, resume or delete recovery descriptors.

use anyhow::{bail, Result};
use clap::Args;
use std::path::PathBuf;
use stowage_core::bulk::{self, BulkContext, RecoverOverrides};
use stowage_core::recovery::{BulkJobType, JobFilter, JobId};

use crate::cli::interrupt;

#[derive(Debug, Args)]
pub struct RecoverArgs {
    /// Job identifier.
    #[arg(short, long)]
    pub id: Option<JobId>,

    /// Only jobs for this bucket.
    #[arg(short, long)]
    pub bucket: Option<String>,

    /// Only jobs of this type (PUT_BULK or GET_BULK).
    #[arg(long, value_name = "TYPE")]
    pub job_type: Option<BulkJobType>,

    /// Resume the single matching job.
    #[arg(long, conflicts_with = "delete")]
    pub recover: bool,

    /// Delete every matching descriptor.
    #[arg(long)]
    pub delete: bool,

    /// Allow --delete without any filter.
    #[arg(long)]
    pub force: bool,

    /// Local directory to use instead of the recorded one.
    #[arg(short, long)]
    pub directory: Option<PathBuf>,

    /// Objects in flight at once instead of the recorded count.
    #[arg(long, value_name = "N")]
    pub threads: Option<usize>,
}

const NO_MATCH: &str = "No matching recovery files found.";

pub async fn run_recover(ctx: &BulkContext, args: RecoverArgs) -> Result<()> {
    let filter = JobFilter {
        id: args.id,
        bucket: args.bucket.clone(),
        job_type: args.job_type,
    };

    if args.delete {
        if filter.is_empty() && !args.force {
            bail!("refusing to delete all recovery descriptors; pass --id, --bucket or --job-type, or --force");
        }
        let removed = ctx.store.delete_matching(&filter)?;
        if removed.is_empty() {
            println!("{NO_MATCH}");
        }
        for d in removed {
            println!("Deleted recovery descriptor: {d}");
        }
        return Ok(());
    }

    if args.recover {
        let target = bulk::select_single(ctx.store.search(&filter)?)?;
        let overrides = RecoverOverrides {
            directory: args.directory,
            threads: args.threads,
        };
        let _watch = interrupt::watch(ctx.abort.clone());
        let outcome = bulk::recover_job(ctx, target.id, overrides).await?;
        println!("{outcome}");
        return Ok(());
    }

    // An explicit id that has no descriptor is an error, not an empty listing.
    let matches = match args.id {
        Some(id) => {
            let d = ctx.store.read(id)?;
            if filter.matches(&d) {
                vec![d]
            } else {
                Vec::new()
            }
        }
        None => ctx.store.search(&filter)?,
    };
    if matches.is_empty() {
        println!("{NO_MATCH}");
    }
    for d in matches {
        println!("{d}");
    }
    Ok(())
}
