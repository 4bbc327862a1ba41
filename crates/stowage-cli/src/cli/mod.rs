//! CLI for stowage bulk transfers.

mod commands;
mod interrupt;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::fmt;
use std::path::PathBuf;
use stowage_core::appliance;
use stowage_core::bulk::BulkContext;
use stowage_core::config::{self, StowageConfig};
use stowage_core::handlers::ErrorHandlers;
use stowage_core::recovery::{JobId, RecoveryStore};

use commands::{
    run_completions, run_delete_job, run_get_bulk, run_get_object, run_health, run_put_bulk,
    run_recover, GetBulkArgs, GetObjectArgs, PutBulkArgs, RecoverArgs,
};

/// Top-level CLI. Global flags are recognised before the subcommand, which
/// then validates its own flag set.
#[derive(Debug, Parser)]
#[command(name = "stowage")]
#[command(about = "Bulk transfers to and from an object/tape storage appliance", long_about = None)]
pub struct Cli {
    /// Appliance endpoint URL (overrides the config file).
    #[arg(long, global = true, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Use this config file instead of ~/.config/stowage/config.toml.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Upload a directory (or file names piped on stdin) as one bulk job.
    PutBulk(PutBulkArgs),

    /// Download objects from a bucket into a directory as one bulk job.
    GetBulk(GetBulkArgs),

    /// Download a single object.
    GetObject(GetObjectArgs),

    /// List, resume or delete recoverable jobs.
    Recover(RecoverArgs),

    /// Cancel a job on the appliance. Any local recovery descriptor is kept.
    DeleteJob {
        /// Job identifier.
        id: JobId,
    },

    /// Show outstanding appliance failures without starting a job.
    Health,

    /// Print a shell completion script.
    Completions {
        /// Target shell.
        shell: clap_complete::Shell,
    },
}

/// A failed command, already rendered through the error handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFailed(pub String);

impl fmt::Display for CommandFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl CliCommand {
    pub async fn run_from_args(handlers: &ErrorHandlers) -> Result<(), CommandFailed> {
        let cli = Cli::parse();
        cli.run(handlers).await
    }
}

impl Cli {
    /// Run the parsed command. Errors are rendered with `handlers`.
    pub async fn run(self, handlers: &ErrorHandlers) -> Result<(), CommandFailed> {
        self.dispatch().await.map_err(|err| {
            tracing::error!("command failed: {:#}", err);
            CommandFailed(handlers.render(&err))
        })
    }

    async fn dispatch(self) -> Result<()> {
        if let CliCommand::Completions { shell } = self.command {
            return run_completions(shell);
        }

        let cfg = match &self.config {
            Some(path) => config::load_from_path(path)?,
            None => config::load_or_init()?,
        };
        tracing::debug!("loaded config: {:?}", cfg);
        let ctx = connect(&cfg, self.endpoint.as_deref())?;

        match self.command {
            CliCommand::PutBulk(args) => run_put_bulk(&ctx, &cfg, args).await?,
            CliCommand::GetBulk(args) => run_get_bulk(&ctx, &cfg, args).await?,
            CliCommand::GetObject(args) => run_get_object(&ctx, args).await?,
            CliCommand::Recover(args) => run_recover(&ctx, args).await?,
            CliCommand::DeleteJob { id } => run_delete_job(&ctx, id).await?,
            CliCommand::Health => run_health(&ctx).await?,
            CliCommand::Completions { .. } => {}
        }

        Ok(())
    }
}

fn connect(cfg: &StowageConfig, endpoint: Option<&str>) -> Result<BulkContext> {
    let endpoint = endpoint.unwrap_or(&cfg.endpoint);
    let appliance = appliance::connect(endpoint)?;
    let store = RecoveryStore::new(cfg.recovery_dir()?);
    tracing::debug!(endpoint, recovery_dir = %store.dir().display(), "connected");
    Ok(BulkContext::new(appliance, store))
}

#[cfg(test)]
mod tests;
