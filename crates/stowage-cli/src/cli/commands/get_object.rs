//! `stowage get-object` – download one object.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use stowage_core::bulk::{self, BulkContext, GetObjectOptions};

use crate::cli::interrupt;

#[derive(Debug, Args)]
pub struct GetObjectArgs {
    /// Source bucket.
    #[arg(short, long)]
    pub bucket: String,

    /// Object name.
    #[arg(short = 'o', long = "object")]
    pub name: String,

    /// Local directory to write into.
    #[arg(short, long, default_value = ".")]
    pub directory: PathBuf,

    /// Skip the download when the local file is already up to date.
    #[arg(long)]
    pub sync: bool,
}

pub async fn run_get_object(ctx: &BulkContext, args: GetObjectArgs) -> Result<()> {
    let opts = GetObjectOptions {
        bucket: args.bucket,
        name: args.name,
        directory: args.directory,
        sync: args.sync,
    };
    let _watch = interrupt::watch(ctx.abort.clone());
    let outcome = bulk::get_object(ctx, opts).await?;
    println!("{outcome}");
    Ok(())
}
