//! `stowage get-bulk` – download a bucket, prefixes of it, or piped names.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use stowage_core::bulk::{self, BulkContext, GetBulkOptions};
use stowage_core::config::StowageConfig;

use super::read_stdin_names;
use crate::cli::interrupt;

#[derive(Debug, Args)]
pub struct GetBulkArgs {
    /// Source bucket.
    #[arg(short, long)]
    pub bucket: String,

    /// Local directory to write into.
    #[arg(short, long, default_value = ".")]
    pub directory: PathBuf,

    /// Only objects whose name starts with this prefix; repeatable.
    #[arg(short, long = "prefix", value_name = "PREFIX")]
    pub prefixes: Vec<String>,

    /// Read exact object names from stdin instead of listing the bucket.
    #[arg(long, conflicts_with = "prefixes")]
    pub from_stdin: bool,

    /// Only fetch objects newer than the local file.
    #[arg(long)]
    pub sync: bool,

    /// Remove local files whose object no longer exists, once all transfers succeed.
    #[arg(long)]
    pub mirror: bool,

    /// Proceed despite outstanding appliance failures.
    #[arg(long)]
    pub force: bool,

    /// Objects in flight at once (default from config).
    #[arg(long, value_name = "N")]
    pub threads: Option<usize>,
}

pub async fn run_get_bulk(ctx: &BulkContext, cfg: &StowageConfig, args: GetBulkArgs) -> Result<()> {
    let piped_names = if args.from_stdin {
        Some(read_stdin_names()?)
    } else {
        None
    };
    let opts = GetBulkOptions {
        bucket: args.bucket,
        directory: args.directory,
        prefixes: args.prefixes,
        piped_names,
        sync: args.sync,
        force: args.force,
        threads: args.threads.unwrap_or(cfg.default_threads),
        mirror: args.mirror,
    };

    let _watch = interrupt::watch(ctx.abort.clone());
    let outcome = bulk::get_bulk(ctx, opts).await?;
    println!("{outcome}");
    Ok(())
}
