//! `stowage put-bulk` – upload a directory or piped file names.

use anyhow::{bail, Result};
use clap::Args;
use std::io::IsTerminal;
use std::path::PathBuf;
use stowage_core::bulk::{self, BulkContext, PutBulkOptions, PutSource};
use stowage_core::config::StowageConfig;
use stowage_core::metadata;

use super::read_stdin_names;
use crate::cli::interrupt;

#[derive(Debug, Args)]
pub struct PutBulkArgs {
    /// Target bucket (created if missing).
    #[arg(short, long)]
    pub bucket: String,

    /// Directory to upload. Without it, file names are read from stdin.
    #[arg(short, long)]
    pub directory: Option<PathBuf>,

    /// Prefix prepended to every object name.
    #[arg(short, long)]
    pub prefix: Option<String>,

    /// Only send files newer than the stored object.
    #[arg(long)]
    pub sync: bool,

    /// Proceed despite outstanding appliance failures.
    #[arg(long)]
    pub force: bool,

    /// Objects in flight at once (default from config).
    #[arg(long, value_name = "N")]
    pub threads: Option<usize>,

    /// Compute SHA-256 per file and have the appliance verify it.
    #[arg(long)]
    pub checksum: bool,

    /// Extra object metadata, repeatable.
    #[arg(long = "metadata", value_name = "KEY:VALUE")]
    pub metadata: Vec<String>,

    /// When several files map to one object name, keep the first instead of skipping all.
    #[arg(long)]
    pub ignore_naming_conflicts: bool,

    /// Follow symbolic links instead of skipping them.
    #[arg(long)]
    pub follow_symlinks: bool,
}

impl PutBulkArgs {
    fn into_options(self, cfg: &StowageConfig, source: PutSource) -> Result<PutBulkOptions> {
        Ok(PutBulkOptions {
            bucket: self.bucket,
            source,
            prefix: self.prefix,
            sync: self.sync,
            force: self.force,
            threads: self.threads.unwrap_or(cfg.default_threads),
            checksum: self.checksum,
            metadata: metadata::parse_user_metadata(&self.metadata)?,
            ignore_naming_conflicts: self.ignore_naming_conflicts,
            follow_symlinks: self.follow_symlinks || cfg.follow_symlinks,
        })
    }
}

pub async fn run_put_bulk(ctx: &BulkContext, cfg: &StowageConfig, args: PutBulkArgs) -> Result<()> {
    let source = match &args.directory {
        Some(dir) => PutSource::Directory(dir.clone()),
        None => {
            if std::io::stdin().is_terminal() {
                bail!("put-bulk needs --directory or file names piped on stdin");
            }
            PutSource::Piped {
                base: std::env::current_dir()?,
                names: read_stdin_names()?,
            }
        }
    };
    let opts = args.into_options(cfg, source)?;

    let _watch = interrupt::watch(ctx.abort.clone());
    let outcome = bulk::put_bulk(ctx, opts).await?;
    println!("{outcome}");
    Ok(())
}
